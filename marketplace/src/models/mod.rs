mod auction;
mod inventory;
mod listing;
mod order;
mod participant;
mod round;
pub mod token;
mod user;
mod wallet;

pub use auction::{Auction, AuctionStatus, AuctionType, CreateAuction};
pub use inventory::{ResourceTransaction, ResourceTxType, TraderInventory};
pub use listing::{Listing, ListingStatus, ListingUpdate};
pub use order::{AuctionOrder, OrderError, PlaceOrderResult};
pub use participant::{Participant, ParticipantStatus};
pub use round::{AuctionClearingRound, NewClearingRound};
pub use token::TokenService;
pub use user::User;
pub use wallet::{
    WalletAccount, WalletBalance, WalletError, WalletTransaction, WalletTxType, WalletUpdate,
};
