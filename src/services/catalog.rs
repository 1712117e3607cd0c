//! Product catalog: seller-owned listings and the public storefront

use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{NewProduct, Product, ProductPatch, Seller};
use crate::domain::value_objects::parse_id;
use crate::store::Repositories;
use crate::{EcommerceError, Result};

pub struct CatalogService { repos: Repositories }

impl CatalogService {
    pub fn new(repos: Repositories) -> Self { Self { repos } }

    /// Callers pass a seller that has already been checked for approval.
    pub async fn add(&self, seller: &Seller, new: NewProduct) -> Result<Product> {
        new.validate()?;
        let product = self.repos.catalog.insert_product(Product::create(seller.id, new)).await?;
        tracing::info!(product_id = %product.id, seller_id = %seller.id, stock = product.stock, "product listed");
        Ok(product)
    }

    pub async fn list_own(&self, seller_id: Uuid) -> Result<Vec<Product>> {
        Ok(self.repos.catalog.products_by_seller(seller_id).await?)
    }

    pub async fn update(&self, seller: &Seller, raw_id: &str, patch: ProductPatch) -> Result<Product> {
        patch.validate()?;
        let id = parse_id(raw_id)?;
        let current = self.get_by_id(id).await?;
        if current.seller_id != seller.id {
            tracing::warn!(product_id = %id, seller_id = %seller.id, "update of another seller's product");
            return Err(EcommerceError::Unauthorized("Unauthorized seller".into()));
        }
        Ok(self.repos.catalog.update_product(id, &patch).await?)
    }

    /// Missing and foreign products are indistinguishable to the caller.
    pub async fn delete(&self, seller: &Seller, raw_id: &str) -> Result<()> {
        let id = parse_id(raw_id)?;
        if !self.repos.catalog.delete_product(id, seller.id).await? {
            return Err(EcommerceError::NotFound("Product".into()));
        }
        tracing::info!(product_id = %id, seller_id = %seller.id, "product deleted");
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<Product>> { Ok(self.repos.catalog.products().await?) }

    pub async fn get(&self, raw_id: &str) -> Result<Product> { self.get_by_id(parse_id(raw_id)?).await }

    async fn get_by_id(&self, id: Uuid) -> Result<Product> {
        self.repos.catalog.product(id).await?.ok_or_else(|| EcommerceError::NotFound("Product".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::sample_address;
    use crate::events::EventPublisher;
    use crate::notify::LogNotifier;
    use crate::services::testing::{seed_customer, seed_seller};
    use crate::services::{CheckoutService, PurchaseRequest};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.into(), description: "Hand made".into(), price: Decimal::new(4999, 2), category: "Home".into(),
            stock: 4, images: vec!["https://cdn/x.png".into()], brand: "Kiln".into(),
        }
    }

    #[tokio::test]
    async fn seller_manages_own_products() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let svc = CatalogService::new(repos);

        let p = svc.add(&seller, new_product("Vase")).await.unwrap();
        let patched = svc.update(&seller, &p.id.to_string(), ProductPatch { stock: Some(9), ..Default::default() }).await.unwrap();
        assert_eq!(patched.stock, 9);
        assert_eq!(patched.name, "Vase");
        assert_eq!(svc.list_own(seller.id).await.unwrap().len(), 1);

        svc.delete(&seller, &p.id.to_string()).await.unwrap();
        assert!(matches!(svc.get(&p.id.to_string()).await, Err(EcommerceError::NotFound(_))));
    }

    #[tokio::test]
    async fn other_sellers_cannot_touch_a_product() {
        let repos = Repositories::in_memory();
        let owner = seed_seller(&repos, true).await;
        let intruder = seed_seller(&repos, true).await;
        let svc = CatalogService::new(repos);
        let p = svc.add(&owner, new_product("Bowl")).await.unwrap();

        let err = svc.update(&intruder, &p.id.to_string(), ProductPatch { price: Some(Decimal::ONE), ..Default::default() }).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Unauthorized(_)));
        assert!(matches!(svc.delete(&intruder, &p.id.to_string()).await, Err(EcommerceError::NotFound(_))));
        assert_eq!(svc.get(&p.id.to_string()).await.unwrap().price, Decimal::new(4999, 2));
    }

    #[tokio::test]
    async fn edit_does_not_restore_stock_sold_meanwhile() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let customer = seed_customer(&repos).await;
        let svc = CatalogService::new(repos.clone());
        let checkout = CheckoutService::new(repos.clone(), EventPublisher::default(), Arc::new(LogNotifier));
        let p = svc.add(&seller, new_product("Vase")).await.unwrap();

        let request: PurchaseRequest = serde_json::from_value(serde_json::json!({
            "sellerId": seller.id, "shippingAddress": sample_address(),
            "products": [{ "productId": p.id, "quantity": 3 }],
        })).unwrap();
        checkout.place_order(customer.id, request).await.unwrap();

        let patch = ProductPatch { name: Some("Tall vase".into()), ..Default::default() };
        let edited = svc.update(&seller, &p.id.to_string(), patch).await.unwrap();
        assert_eq!(edited.name, "Tall vase");
        assert_eq!(edited.stock, 1);
        assert_eq!(svc.get(&p.id.to_string()).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn invalid_listing_is_rejected() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let svc = CatalogService::new(repos);
        let mut bad = new_product("Cup");
        bad.stock = -1;
        assert!(matches!(svc.add(&seller, bad).await, Err(EcommerceError::Validation(_))));
        assert!(matches!(svc.get("not-an-id").await, Err(EcommerceError::InvalidReference(_))));
    }
}
