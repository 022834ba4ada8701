//! Typed endpoint catalogue of the storefront backend.
//!
//! DESIGN
//! ======
//! Thin borrowing wrappers over [`ApiClient`]: each method picks the path, the
//! verb and the auth flags, and decodes the envelope payload. Every call goes
//! through the client's refresh-and-replay path unless it is marked public.
//! Login and logout live on [`crate::AuthService`] because they mutate the
//! session.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::ApiClient;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::executor::RequestOptions;
use crate::session::Member;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const SHIPPING_FEE: u64 = 3000;
pub const FREE_SHIPPING_THRESHOLD: u64 = 50_000;

pub mod endpoints {
    pub mod member {
        pub const SIGNUP: &str = "/member/signup";
        pub const LOGIN: &str = "/member/login";
        pub const LOGOUT: &str = "/member/logout";
        pub const PROFILE: &str = "/member/profile";
        pub const VALIDATE_TOKEN: &str = "/member/validate-token";
        pub const UPDATE_PROFILE: &str = "/member/profile/update";
        pub const FORGOT_PASSWORD: &str = "/member/forgot-password";
        pub const RESET_PASSWORD: &str = "/member/reset-password";
        pub const CHECK_LOGIN_ID: &str = "/member/check-login-id";
        pub const CHECK_EMAIL: &str = "/member/check-email";
        pub const REISSUE: &str = "/member/reissue";
    }

    pub mod product {
        pub const LIST: &str = "/products";
        pub const DETAIL: &str = "/products/:id";
        pub const SEARCH: &str = "/products/search";
    }

    pub mod cart {
        pub const LIST: &str = "/cart";
        pub const ADD: &str = "/cart/add";
        pub const UPDATE: &str = "/cart/update";
        pub const REMOVE: &str = "/cart/remove";
        pub const CLEAR: &str = "/cart/clear";
    }

    pub mod order {
        pub const CREATE: &str = "/orders";
        pub const LIST: &str = "/orders";
        pub const DETAIL: &str = "/orders/:id";
        pub const CANCEL: &str = "/orders/:id/cancel";
    }
}

/// Fill the `:id` placeholder of an endpoint template.
#[must_use]
pub fn with_id(template: &str, id: impl Display) -> String {
    template.replace(":id", &id.to_string())
}

/// Flat shipping fee, waived from the free-shipping threshold up.
#[must_use]
pub fn shipping_fee(subtotal: u64) -> u64 {
    if subtotal >= FREE_SHIPPING_THRESHOLD { 0 } else { SHIPPING_FEE }
}

impl ApiClient {
    #[must_use]
    pub fn member(&self) -> MemberApi<'_> {
        MemberApi { client: self }
    }

    #[must_use]
    pub fn products(&self) -> ProductApi<'_> {
        ProductApi { client: self }
    }

    #[must_use]
    pub fn cart(&self) -> CartApi<'_> {
        CartApi { client: self }
    }

    #[must_use]
    pub fn orders(&self) -> OrderApi<'_> {
        OrderApi { client: self }
    }
}

// =============================================================================
// MEMBER
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub login_id: String,
    pub password: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub login_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub struct MemberApi<'a> {
    client: &'a ApiClient,
}

impl MemberApi<'_> {
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn signup(&self, request: &SignupRequest) -> Result<Envelope, ClientError> {
        self.public_post(endpoints::member::SIGNUP, request).await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn profile(&self) -> Result<Envelope<Member>, ClientError> {
        Ok(self.client.get(endpoints::member::PROFILE).await?.decode())
    }

    /// Ask the backend whether the current access token is still accepted.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn validate_token(&self) -> Result<Envelope, ClientError> {
        self.client
            .execute(endpoints::member::VALIDATE_TOKEN, RequestOptions::get().skip_auth_refresh())
            .await
    }

    /// Update the profile and keep the session's copy in sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Envelope<Member>, ClientError> {
        let envelope = self
            .client
            .put(endpoints::member::UPDATE_PROFILE, request)
            .await?
            .decode::<Member>();
        if let Some(member) = &envelope.data {
            self.client.session().set_member(Some(member.clone()));
        }
        Ok(envelope)
    }

    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<Envelope, ClientError> {
        self.public_post(endpoints::member::FORGOT_PASSWORD, request).await
    }

    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Envelope, ClientError> {
        self.public_post(endpoints::member::RESET_PASSWORD, request).await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn check_login_id(&self, login_id: &str) -> Result<Envelope, ClientError> {
        let options = RequestOptions::get().query("loginId", login_id).skip_auth_attach();
        self.client.execute(endpoints::member::CHECK_LOGIN_ID, options).await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn check_email(&self, email: &str) -> Result<Envelope, ClientError> {
        let options = RequestOptions::get().query("email", email).skip_auth_attach();
        self.client.execute(endpoints::member::CHECK_EMAIL, options).await
    }

    async fn public_post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<Envelope, ClientError> {
        let options = RequestOptions::post()
            .body(serde_json::to_value(body)?)
            .skip_auth_attach();
        self.client.execute(endpoint, options).await
    }
}

// =============================================================================
// PRODUCTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Latest,
    PriceAsc,
    PriceDesc,
    Rating,
    Sales,
}

impl ProductSort {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
            Self::Sales => "sales",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "latest" => Some(Self::Latest),
            "price_asc" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "rating" => Some(Self::Rating),
            "sales" => Some(Self::Sales),
            _ => None,
        }
    }
}

/// Listing filters. Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub sort: Option<ProductSort>,
    pub page: u32,
    pub size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self { category: None, sort: None, page: 0, size: DEFAULT_PAGE_SIZE }
    }
}

impl ProductQuery {
    /// Query pairs with the page size clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(category) = &self.category {
            pairs.push(("category".to_owned(), category.clone()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort".to_owned(), sort.as_str().to_owned()));
        }
        pairs.push(("page".to_owned(), self.page.to_string()));
        pairs.push(("size".to_owned(), self.size.clamp(1, MAX_PAGE_SIZE).to_string()));
        pairs
    }

    fn apply(&self, mut options: RequestOptions) -> RequestOptions {
        options.query.extend(self.to_pairs());
        options
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
}

pub struct ProductApi<'a> {
    client: &'a ApiClient,
}

impl ProductApi<'_> {
    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn list(&self, query: &ProductQuery) -> Result<Envelope<Vec<Product>>, ClientError> {
        let options = query.apply(RequestOptions::get());
        Ok(self.client.execute(endpoints::product::LIST, options).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn detail(&self, id: i64) -> Result<Envelope<Product>, ClientError> {
        let endpoint = with_id(endpoints::product::DETAIL, id);
        Ok(self.client.get(&endpoint).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn search(&self, keyword: &str, query: &ProductQuery) -> Result<Envelope<Vec<Product>>, ClientError> {
        let options = query.apply(RequestOptions::get().query("keyword", keyword));
        Ok(self.client.execute(endpoints::product::SEARCH, options).await?.decode())
    }
}

// =============================================================================
// CART
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u32>,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.quantity))
    }
}

/// Sum of every line, saturating at `u64::MAX`.
#[must_use]
pub fn cart_subtotal(items: &[CartItem]) -> u64 {
    items
        .iter()
        .map(CartItem::line_total)
        .fold(0, u64::saturating_add)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub id: i64,
    pub quantity: u32,
}

pub struct CartApi<'a> {
    client: &'a ApiClient,
}

impl CartApi<'_> {
    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn list(&self) -> Result<Envelope<Vec<CartItem>>, ClientError> {
        Ok(self.client.get(endpoints::cart::LIST).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn add(&self, request: &AddCartItemRequest) -> Result<Envelope, ClientError> {
        self.client.post(endpoints::cart::ADD, request).await
    }

    /// Quantities below one are raised to one.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn update(&self, request: &UpdateCartItemRequest) -> Result<Envelope, ClientError> {
        let request = UpdateCartItemRequest { id: request.id, quantity: request.quantity.max(1) };
        self.client.put(endpoints::cart::UPDATE, &request).await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn remove(&self, id: i64) -> Result<Envelope, ClientError> {
        let options = RequestOptions::delete().body(json!({ "id": id }));
        self.client.execute(endpoints::cart::REMOVE, options).await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn clear(&self) -> Result<Envelope, ClientError> {
        self.client.delete(endpoints::cart::CLEAR).await
    }
}

// =============================================================================
// ORDERS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipping,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Orders can be cancelled until they ship.
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Transfer,
    Deposit,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

pub struct OrderApi<'a> {
    client: &'a ApiClient,
}

impl OrderApi<'_> {
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded.
    pub async fn create(&self, request: &CreateOrderRequest) -> Result<Envelope<Order>, ClientError> {
        Ok(self.client.post(endpoints::order::CREATE, request).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn list(&self) -> Result<Envelope<Vec<Order>>, ClientError> {
        Ok(self.client.get(endpoints::order::LIST).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn detail(&self, id: i64) -> Result<Envelope<Order>, ClientError> {
        Ok(self.client.get(&with_id(endpoints::order::DETAIL, id)).await?.decode())
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn cancel(&self, id: i64) -> Result<Envelope, ClientError> {
        self.client
            .execute(&with_id(endpoints::order::CANCEL, id), RequestOptions::post())
            .await
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
