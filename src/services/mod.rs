//! Application services. Each one owns a use case and talks to storage only through [`Repositories`].
//!
//! [`Repositories`]: crate::store::Repositories

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod registration;

pub use accounts::{AccountService, AdminDashboard, LoginResponse};
pub use cart::{CartChange, CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, LineRequest, PurchasePlan, PurchaseReceipt, PurchaseRequest};
pub use orders::{OrderService, SellerDashboard};
pub use registration::{OtpRegistration, RegistrationOutcome, RegistrationService};

#[cfg(test)]
pub(crate) mod testing {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::aggregates::{product, Customer, NewCustomer, NewSeller, Product, Seller, SellerStatus};
    use crate::store::Repositories;

    pub async fn seed_seller(repos: &Repositories, approved: bool) -> Seller {
        let n = Uuid::new_v4().simple().to_string();
        let mut seller = Seller::register(NewSeller {
            owner_name: "Owner".into(), contact_no: "9999999999".into(), shop_name: format!("Shop {n}"),
            email: format!("seller-{n}@example.com"), password: "secret1".into(), seller_address: "Pune".into(),
            shop_website: None, gst_number: "27AAAAA0000A1Z5".into(), id_proof: "id.png".into(),
            years_in_business: 2, customer_support: "help@example.com".into(),
        }, "hash".into());
        if approved { seller.set_status(SellerStatus::Approved); }
        repos.accounts.insert_seller(seller).await.unwrap()
    }

    pub async fn seed_customer(repos: &Repositories) -> Customer {
        let n = Uuid::new_v4().simple().to_string();
        let customer = Customer::register(NewCustomer {
            name: "Buyer".into(), email: format!("buyer-{n}@example.com"), phone: "9876543210".into(), password: "secret1".into(),
        }, "hash".into());
        repos.accounts.insert_customer(customer).await.unwrap()
    }

    pub async fn seed_product(repos: &Repositories, seller_id: Uuid, name: &str, price: Decimal, stock: i32) -> Product {
        repos.catalog.insert_product(product::sample(seller_id, name, price, stock)).await.unwrap()
    }
}
