mod admin;
mod auctions;
mod auth;
mod listings;
mod me;
mod resources;
mod wallet;

pub use admin::admin_routes;
pub use auctions::{auction_public_routes, auction_trader_routes};
pub use auth::auth_routes;
pub use listings::{listing_admin_routes, listing_routes};
pub use me::me_routes;
pub use resources::{inventory_routes, resource_routes};
pub use wallet::wallet_routes;
