use super::*;
use crate::test_helpers::{FakeBackend, Harness, signed_in_session};
use reqwest::Method;

fn product_json(id: i64, price: u64) -> serde_json::Value {
    json!({ "id": id, "name": format!("item {id}"), "price": price, "categoryId": 3 })
}

#[test]
fn id_placeholder_is_filled() {
    assert_eq!(with_id(endpoints::product::DETAIL, 42), "/products/42");
    assert_eq!(with_id(endpoints::order::CANCEL, 7), "/orders/7/cancel");
}

#[test]
fn shipping_is_free_from_threshold() {
    assert_eq!(shipping_fee(0), SHIPPING_FEE);
    assert_eq!(shipping_fee(49_999), 3000);
    assert_eq!(shipping_fee(50_000), 0);
    assert_eq!(shipping_fee(120_000), 0);
}

#[test]
fn product_query_clamps_page_size() {
    let query = ProductQuery { size: 500, ..ProductQuery::default() };
    assert!(query.to_pairs().contains(&("size".to_owned(), "100".to_owned())));

    let query = ProductQuery { size: 0, ..ProductQuery::default() };
    assert!(query.to_pairs().contains(&("size".to_owned(), "1".to_owned())));

    let pairs = ProductQuery::default().to_pairs();
    assert_eq!(
        pairs,
        vec![("page".to_owned(), "0".to_owned()), ("size".to_owned(), DEFAULT_PAGE_SIZE.to_string())]
    );
}

#[test]
fn sort_round_trips_through_wire_names() {
    for sort in [
        ProductSort::Latest,
        ProductSort::PriceAsc,
        ProductSort::PriceDesc,
        ProductSort::Rating,
        ProductSort::Sales,
    ] {
        assert_eq!(ProductSort::parse(sort.as_str()), Some(sort));
        assert_eq!(serde_json::to_value(sort).unwrap(), json!(sort.as_str()));
    }
    assert_eq!(ProductSort::parse("cheapest"), None);
}

#[test]
fn cart_subtotal_sums_lines() {
    let items = vec![
        CartItem { id: 1, product_id: 10, name: "a".into(), price: 12_000, quantity: 2, max_quantity: None },
        CartItem { id: 2, product_id: 11, name: "b".into(), price: 5_500, quantity: 1, max_quantity: Some(3) },
    ];
    assert_eq!(cart_subtotal(&items), 29_500);
    assert_eq!(shipping_fee(cart_subtotal(&items)), SHIPPING_FEE);
}

#[test]
fn cart_totals_saturate_on_huge_prices() {
    let huge = CartItem { id: 1, product_id: 10, name: "a".into(), price: u64::MAX / 2, quantity: 3, max_quantity: None };
    assert_eq!(huge.line_total(), u64::MAX);

    let items = vec![
        CartItem { quantity: 1, ..huge.clone() },
        CartItem { id: 2, quantity: 1, ..huge },
        CartItem { id: 3, product_id: 11, name: "b".into(), price: 10, quantity: 1, max_quantity: None },
    ];
    assert_eq!(cart_subtotal(&items), u64::MAX);
    assert_eq!(shipping_fee(cart_subtotal(&items)), 0);
}

#[test]
fn order_status_cancellable_until_shipping() {
    assert!(OrderStatus::Pending.is_cancellable());
    assert!(OrderStatus::Confirmed.is_cancellable());
    assert!(!OrderStatus::Shipping.is_cancellable());
    assert!(!OrderStatus::Delivered.is_cancellable());
    assert!(!OrderStatus::Cancelled.is_cancellable());
}

#[tokio::test]
async fn product_list_sends_filters_and_decodes() {
    let backend = FakeBackend::new().canned(
        endpoints::product::LIST,
        200,
        json!({ "data": [product_json(1, 1000), product_json(2, 2000)] }),
    );
    let h = Harness::new(backend, signed_in_session("t1"));

    let query = ProductQuery {
        category: Some("books".to_owned()),
        sort: Some(ProductSort::PriceDesc),
        page: 2,
        size: 10,
    };
    let envelope = h.client.products().list(&query).await.unwrap();

    assert!(envelope.success);
    let products = envelope.data.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[1].price, 2000);
    assert_eq!(products[0].category_id, Some(3));
    let call = &h.backend.calls_to(endpoints::product::LIST)[0];
    assert_eq!(call.query.as_deref(), Some("category=books&sort=price_desc&page=2&size=10"));
}

#[tokio::test]
async fn product_detail_with_wrong_shape_is_a_failure() {
    let backend = FakeBackend::new().canned("/products/9", 200, json!({ "data": { "unexpected": true } }));
    let h = Harness::new(backend, signed_in_session("t1"));

    let envelope = h.client.products().detail(9).await.unwrap();

    assert!(!envelope.success);
    assert_eq!(envelope.status, Some(200));
    assert!(envelope.error.unwrap().starts_with("unexpected response shape"));
}

#[tokio::test]
async fn search_adds_keyword() {
    let backend = FakeBackend::new().canned(endpoints::product::SEARCH, 200, json!({ "data": [] }));
    let h = Harness::new(backend, signed_in_session("t1"));

    let envelope = h
        .client
        .products()
        .search("lamp", &ProductQuery::default())
        .await
        .unwrap();

    assert_eq!(envelope.data, Some(Vec::new()));
    let call = &h.backend.calls_to(endpoints::product::SEARCH)[0];
    assert_eq!(call.query.as_deref(), Some("keyword=lamp&page=0&size=20"));
}

#[tokio::test]
async fn cart_remove_sends_id_in_delete_body() {
    let h = Harness::new(FakeBackend::new().valid_token("t1"), signed_in_session("t1"));

    h.client.cart().remove(5).await.unwrap();

    let call = &h.backend.calls_to(endpoints::cart::REMOVE)[0];
    assert_eq!(call.method, Method::DELETE);
    assert_eq!(call.body, Some(json!({ "id": 5 })));
}

#[tokio::test]
async fn cart_update_raises_quantity_to_one() {
    let h = Harness::new(FakeBackend::new().valid_token("t1"), signed_in_session("t1"));

    h.client
        .cart()
        .update(&UpdateCartItemRequest { id: 3, quantity: 0 })
        .await
        .unwrap();

    let call = &h.backend.calls_to(endpoints::cart::UPDATE)[0];
    assert_eq!(call.method, Method::PUT);
    assert_eq!(call.body, Some(json!({ "id": 3, "quantity": 1 })));
}

#[tokio::test]
async fn cart_calls_refresh_like_any_other_request() {
    let backend = FakeBackend::new().reissues_to("fresh");
    let h = Harness::new(backend, signed_in_session("stale"));

    let envelope = h
        .client
        .cart()
        .add(&AddCartItemRequest { product_id: 1, quantity: 2 })
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(h.backend.reissue_count(), 1);
    assert_eq!(h.backend.calls_to(endpoints::cart::ADD).len(), 2);
}

#[tokio::test]
async fn order_create_and_cancel() {
    let backend = FakeBackend::new().valid_token("t1").canned(
        endpoints::order::CREATE,
        201,
        json!({ "data": { "id": 77, "status": "pending", "totalAmount": 53000, "paymentMethod": "card" } }),
    );
    let h = Harness::new(backend, signed_in_session("t1"));

    let request = CreateOrderRequest {
        items: vec![OrderLine { product_id: 1, quantity: 1 }],
        payment_method: PaymentMethod::Card,
        shipping_address: None,
    };
    let envelope = h.client.orders().create(&request).await.unwrap();

    let order = envelope.data.unwrap();
    assert_eq!(order.id, 77);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, Some(PaymentMethod::Card));
    assert!(order.items.is_empty());
    assert_eq!(
        h.backend.calls_to(endpoints::order::CREATE)[0].body,
        Some(json!({ "items": [{ "productId": 1, "quantity": 1 }], "paymentMethod": "card" }))
    );

    h.client.orders().cancel(77).await.unwrap();
    let cancel = &h.backend.calls_to("/orders/77/cancel")[0];
    assert_eq!(cancel.method, Method::POST);
}

#[tokio::test]
async fn public_member_calls_skip_the_token() {
    let backend = FakeBackend::new()
        .canned(endpoints::member::SIGNUP, 201, json!({ "message": "created" }))
        .canned(endpoints::member::CHECK_LOGIN_ID, 200, json!({ "data": { "available": true } }));
    let h = Harness::new(backend, signed_in_session("t1"));

    let signup = SignupRequest {
        login_id: "lee".into(),
        password: "secret".into(),
        name: "Lee".into(),
        email: "lee@example.com".into(),
        phone: None,
    };
    let envelope = h.client.member().signup(&signup).await.unwrap();
    assert!(envelope.success);
    assert_eq!(envelope.message.as_deref(), Some("created"));

    h.client.member().check_login_id("lee").await.unwrap();

    let calls = h.backend.calls();
    assert!(calls.iter().all(|call| call.bearer.is_none()));
    assert_eq!(calls[1].query.as_deref(), Some("loginId=lee"));
}

#[tokio::test]
async fn update_profile_syncs_session_member() {
    let backend = FakeBackend::new().canned(
        endpoints::member::UPDATE_PROFILE,
        200,
        json!({ "data": { "loginId": "kim", "name": "Kim Updated" } }),
    );
    let h = Harness::new(backend, signed_in_session("t1"));

    let request = UpdateProfileRequest { name: Some("Kim Updated".into()), ..UpdateProfileRequest::default() };
    let envelope = h.client.member().update_profile(&request).await.unwrap();

    assert!(envelope.success);
    assert_eq!(h.session().member().unwrap().name, "Kim Updated");
    assert_eq!(
        h.backend.calls_to(endpoints::member::UPDATE_PROFILE)[0].body,
        Some(json!({ "name": "Kim Updated" }))
    );
}

#[tokio::test]
async fn validate_token_never_refreshes() {
    let h = Harness::new(FakeBackend::new().reissues_to("fresh"), signed_in_session("stale"));

    let envelope = h.client.member().validate_token().await.unwrap();

    assert!(envelope.is_unauthorized());
    assert_eq!(h.backend.reissue_count(), 0);
}
