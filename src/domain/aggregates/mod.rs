//! Aggregates module
pub mod account;
pub mod cart;
pub mod order;
pub mod product;

pub use account::{
    Address, Admin, Credentials, Customer, NewCustomer, NewSeller, ProfileUpdate, Role, Seller, SellerStatus,
};
pub use cart::{Cart, CartItem};
pub use order::{FulfillmentStatus, LineItem, Order, OrderError, PaymentStatus, StatusUpdate};
pub use product::{NewProduct, Product, ProductError, ProductPatch};
