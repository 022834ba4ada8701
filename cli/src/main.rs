use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use storefront::api::{AddCartItemRequest, ProductQuery, ProductSort, UpdateCartItemRequest};
use storefront::{
    ApiClient, AuthService, AuthStatus, ClientConfig, ClientError, Envelope, FileSessionStore, LogNavigator,
    LoginRequest,
};

const DEFAULT_SESSION_FILE: &str = ".storefront-session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("unknown sort `{0}`; expected latest, price_asc, price_desc, rating or sales")]
    InvalidSort(String),
    #[error("request failed ({status}): {message}")]
    Request { status: String, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "storefront-cli", about = "Storefront API command-line client")]
struct Cli {
    /// Overrides `STOREFRONT_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, env = "STOREFRONT_SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the stored session and print who is signed in.
    Status,
    Login {
        login_id: String,
        #[arg(long, env = "STOREFRONT_PASSWORD")]
        password: String,
    },
    Logout,
    Profile,
    /// Reissue the access token and reload the profile.
    Refresh,
    Products(ProductListArgs),
    Product {
        id: i64,
    },
    Search {
        keyword: String,
        #[command(flatten)]
        list: ProductListArgs,
    },
    Cart(CartCommand),
    Orders(OrderCommand),
}

#[derive(Args, Debug)]
struct ProductListArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = storefront::api::DEFAULT_PAGE_SIZE)]
    size: u32,
}

impl ProductListArgs {
    fn to_query(&self) -> Result<ProductQuery, CliError> {
        let sort = match &self.sort {
            Some(raw) => Some(ProductSort::parse(raw).ok_or_else(|| CliError::InvalidSort(raw.clone()))?),
            None => None,
        };
        Ok(ProductQuery { category: self.category.clone(), sort, page: self.page, size: self.size })
    }
}

#[derive(Args, Debug)]
struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Subcommand, Debug)]
enum CartSubcommand {
    List,
    Add {
        product_id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    Update {
        id: i64,
        quantity: u32,
    },
    Remove {
        id: i64,
    },
    Clear,
}

#[derive(Args, Debug)]
struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrderSubcommand {
    List,
    Show { id: i64 },
    Cancel { id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = ClientConfig::with_base_url(base_url)?.base_url;
    }
    config.session_file = Some(cli.session_file.clone());

    let store = Arc::new(FileSessionStore::new(cli.session_file));
    let client = ApiClient::new(config, store, Arc::new(LogNavigator))?;
    let auth = AuthService::new(client);

    let status = auth.check_auth_status().await;
    tracing::debug!(?status, "session resolved");

    match cli.command {
        Command::Status => run_status(&auth, status),
        Command::Login { login_id, password } => {
            let envelope = auth.login(&LoginRequest { login_id, password }).await?;
            print_envelope(&envelope)
        }
        Command::Logout => {
            auth.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Profile => print_envelope(&auth.load_profile().await?),
        Command::Refresh => print_envelope(&auth.refresh_auth().await?),
        Command::Products(args) => print_envelope(&auth.client().products().list(&args.to_query()?).await?),
        Command::Product { id } => print_envelope(&auth.client().products().detail(id).await?),
        Command::Search { keyword, list } => {
            print_envelope(&auth.client().products().search(&keyword, &list.to_query()?).await?)
        }
        Command::Cart(cart) => run_cart(auth.client(), cart).await,
        Command::Orders(orders) => run_orders(auth.client(), orders).await,
    }
}

fn run_status(auth: &AuthService, status: AuthStatus) -> Result<(), CliError> {
    let snapshot = auth.snapshot();
    let member = snapshot.member.map(|member| member.login_id);
    let json = serde_json::json!({
        "status": format!("{status:?}").to_lowercase(),
        "isAuthenticated": snapshot.is_authenticated,
        "member": member,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn run_cart(client: &ApiClient, cart: CartCommand) -> Result<(), CliError> {
    let cart_api = client.cart();
    match cart.command {
        CartSubcommand::List => {
            let envelope = cart_api.list().await?;
            if let Some(items) = &envelope.data {
                let subtotal = storefront::api::cart_subtotal(items);
                tracing::info!(subtotal, shipping = storefront::api::shipping_fee(subtotal), "cart totals");
            }
            print_envelope(&envelope)
        }
        CartSubcommand::Add { product_id, quantity } => {
            print_envelope(&cart_api.add(&AddCartItemRequest { product_id, quantity }).await?)
        }
        CartSubcommand::Update { id, quantity } => {
            print_envelope(&cart_api.update(&UpdateCartItemRequest { id, quantity }).await?)
        }
        CartSubcommand::Remove { id } => print_envelope(&cart_api.remove(id).await?),
        CartSubcommand::Clear => print_envelope(&cart_api.clear().await?),
    }
}

async fn run_orders(client: &ApiClient, orders: OrderCommand) -> Result<(), CliError> {
    let order_api = client.orders();
    match orders.command {
        OrderSubcommand::List => print_envelope(&order_api.list().await?),
        OrderSubcommand::Show { id } => print_envelope(&order_api.detail(id).await?),
        OrderSubcommand::Cancel { id } => print_envelope(&order_api.cancel(id).await?),
    }
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    if envelope.success {
        return Ok(());
    }
    Err(CliError::Request {
        status: envelope
            .status
            .map_or_else(|| "no response".to_owned(), |status| status.to_string()),
        message: envelope.error_message().to_owned(),
    })
}
