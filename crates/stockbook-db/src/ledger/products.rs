//! Products, baselines, parties and unit display.
//!
//! Creating a product records its initial stock as the baseline
//! (`previous_stock`), so `quantity = previous_stock + Σ entries` holds from
//! the first moment. Ratio edits only change how future quantities convert;
//! every stored piece count stays as it was.

use tracing::{debug, info};
use uuid::Uuid;

use stockbook_core::ledger as planning;
use stockbook_core::units::{self, ConversionRatios, Unit};
use stockbook_core::validation::{validate_name, validate_stock_baseline, validate_text};
use stockbook_core::{CoreError, NewProduct, Party, Product, ProductDetails};

use super::LedgerService;
use crate::error::{DbError, DbResult};
use crate::repository::product::{self, generate_product_id};

impl LedgerService {
    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product whose initial stock becomes its baseline.
    ///
    /// `initial_stock` is entered in `initial_unit` and stored in pieces.
    pub async fn create_product(&self, input: NewProduct) -> DbResult<Product> {
        validate_details(&input.name, input.size.as_deref(), &input.ratios)?;
        validate_stock_baseline(input.initial_stock)?;
        let pieces = units::to_pieces(input.initial_stock, input.initial_unit, &input.ratios)?;

        let now = self.clock.now();
        let product = Product {
            id: generate_product_id(),
            owner_id: self.owner_id.clone(),
            name: input.name.trim().to_string(),
            size: input.size.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            quantity: pieces,
            previous_stock: pieces,
            packets_per_linear: input.ratios.packets_per_linear,
            pieces_per_packet: input.ratios.pieces_per_packet,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.products.insert(&product).await?;

        info!(id = %product.id, name = %product.display_name(), pieces, "Product created");
        Ok(product)
    }

    /// Renames a product or changes its ratios.
    ///
    /// Existing entries and challan items keep the piece counts they were
    /// recorded with.
    pub async fn update_product_details(
        &self,
        product_id: &str,
        details: ProductDetails,
    ) -> DbResult<Product> {
        validate_details(&details.name, details.size.as_deref(), &details.ratios)?;

        let current = self.require_product(product_id).await?;
        let updated = self
            .products
            .update_details(
                &self.owner_id,
                product_id,
                &details,
                current.version,
                self.clock.now(),
            )
            .await?;
        if !updated {
            return Err(DbError::conflict("Product", product_id));
        }

        debug!(id = %product_id, "Product details updated");
        self.require_product(product_id).await
    }

    /// Edits the baseline, shifting `quantity` by the same difference.
    ///
    /// Rejected with `InsufficientStock` when lowering the baseline would
    /// take the current quantity below zero.
    pub async fn set_previous_stock(&self, product_id: &str, pieces: f64) -> DbResult<Product> {
        validate_stock_baseline(pieces)?;

        self.retrying("set_previous_stock", move || async move {
            let mut tx = self.begin_write().await?;
            let current = self.locked_product(&mut tx, product_id).await?;
            let change = planning::plan_baseline(&current, pieces)?;

            if !product::apply_baseline(&mut tx, &self.owner_id, &change, pieces, self.clock.now())
                .await?
            {
                return Err(DbError::conflict("Product", product_id));
            }
            tx.commit().await?;

            info!(
                id = %product_id,
                previous_stock = pieces,
                quantity = change.after,
                "Baseline changed"
            );
            Ok(Product {
                previous_stock: pieces,
                quantity: change.after,
                version: current.version + 1,
                ..current
            })
        })
        .await
    }

    /// Deletes a product that nothing in the ledger references.
    pub async fn delete_product(&self, product_id: &str) -> DbResult<()> {
        self.require_product(product_id).await?;

        let references = self.products.reference_count(product_id).await?;
        if references > 0 {
            return Err(CoreError::ProductInUse {
                product_id: product_id.to_string(),
                references,
            }
            .into());
        }

        self.products.delete(&self.owner_id, product_id).await?;
        info!(id = %product_id, "Product deleted");
        Ok(())
    }

    pub async fn get_product(&self, product_id: &str) -> DbResult<Product> {
        self.require_product(product_id).await
    }

    /// Products ordered by name.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        self.products.list(&self.owner_id).await
    }

    /// Current stock expressed in `unit`, converted with the current ratios.
    pub async fn stock_in_unit(&self, product_id: &str, unit: Unit) -> DbResult<f64> {
        let product = self.require_product(product_id).await?;
        Ok(units::from_pieces(product.quantity, unit, &product.ratios())?)
    }

    /// Pure conversion between any two units.
    pub fn convert(
        &self,
        quantity: f64,
        from: Unit,
        to: Unit,
        ratios: &ConversionRatios,
    ) -> DbResult<f64> {
        Ok(units::convert(quantity, from, to, ratios)?)
    }

    // =========================================================================
    // Parties
    // =========================================================================

    /// Registers a customer challans can be issued to.
    pub async fn create_party(&self, name: &str) -> DbResult<Party> {
        validate_name("name", name).map_err(CoreError::from)?;

        let party = Party {
            id: Uuid::new_v4().to_string(),
            owner_id: self.owner_id.clone(),
            name: name.trim().to_string(),
            created_at: self.clock.now(),
        };
        self.parties.insert(&party).await?;

        info!(id = %party.id, name = %party.name, "Party created");
        Ok(party)
    }

    pub async fn party_exists(&self, party_id: &str) -> DbResult<bool> {
        self.parties.exists(&self.owner_id, party_id).await
    }

    pub async fn list_parties(&self) -> DbResult<Vec<Party>> {
        self.parties.list(&self.owner_id).await
    }
}

/// Name is required, size is optional, ratios may be zero (no such packaging)
/// but never negative or non-finite.
fn validate_details(name: &str, size: Option<&str>, ratios: &ConversionRatios) -> DbResult<()> {
    validate_name("name", name).map_err(CoreError::from)?;
    validate_text("size", size).map_err(CoreError::from)?;

    let usable = |ratio: f64| ratio.is_finite() && ratio >= 0.0;
    if !usable(ratios.packets_per_linear) || !usable(ratios.pieces_per_packet) {
        return Err(CoreError::InvalidConversionFactors {
            packets_per_linear: ratios.packets_per_linear,
            pieces_per_packet: ratios.pieces_per_packet,
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::{self, new_entry, quantity};
    use stockbook_core::{ChallanHeader, ChallanItemInput, EntryKind};

    #[tokio::test]
    async fn test_create_converts_initial_stock() {
        let (_db, ledger) = fixtures::ledger().await;

        let product = ledger
            .create_product(NewProduct {
                name: "  Pipe ".to_string(),
                size: Some("20mm".to_string()),
                ratios: ConversionRatios::new(2.0, 10.0),
                initial_stock: 3.0,
                initial_unit: Unit::Linear,
            })
            .await
            .unwrap();

        assert_eq!(product.name, "Pipe");
        assert_eq!(product.quantity, 60.0);
        assert_eq!(product.previous_stock, 60.0);
        assert_eq!(ledger.get_product(&product.id).await.unwrap(), product);
        assert_eq!(ledger.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (_db, ledger) = fixtures::ledger().await;
        let base = NewProduct {
            name: "Pipe".to_string(),
            size: None,
            ratios: ConversionRatios::new(2.0, 10.0),
            initial_stock: 1.0,
            initial_unit: Unit::Piece,
        };

        let err = ledger
            .create_product(NewProduct {
                name: "  ".to_string(),
                ..base.clone()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Validation(_))));

        let err = ledger
            .create_product(NewProduct {
                initial_stock: -1.0,
                ..base.clone()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidQuantity { .. })));

        // Packet stock needs a pieces-per-packet ratio.
        let err = ledger
            .create_product(NewProduct {
                ratios: ConversionRatios::new(0.0, 0.0),
                initial_unit: Unit::Packet,
                ..base.clone()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidConversionFactors { .. })
        ));

        let err = ledger
            .create_product(NewProduct {
                ratios: ConversionRatios::new(-2.0, 10.0),
                ..base
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidConversionFactors { .. })
        ));
        assert!(ledger.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_baseline_shifts_quantity() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        ledger
            .create_entry(new_entry(&pipe.id, EntryKind::Deliver, 70.0, Unit::Piece))
            .await
            .unwrap();

        let raised = ledger.set_previous_stock(&pipe.id, 150.0).await.unwrap();
        assert_eq!(raised.previous_stock, 150.0);
        assert_eq!(raised.quantity, 80.0);
        assert_eq!(ledger.get_product(&pipe.id).await.unwrap(), raised);

        // 80 on hand: lowering the baseline by 81 would go negative.
        let err = ledger.set_previous_stock(&pipe.id, 69.0).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(quantity(&ledger, &pipe.id).await, 80.0);

        let lowered = ledger.set_previous_stock(&pipe.id, 70.0).await.unwrap();
        assert_eq!(lowered.quantity, 0.0);
    }

    #[tokio::test]
    async fn test_delete_rejected_while_referenced() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let spare = fixtures::product(&ledger, "Spare", 0.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let doc = ledger
            .save_challan(
                &customer.id,
                ChallanHeader::default(),
                &[ChallanItemInput {
                    product_id: pipe.id.clone(),
                    quantity: 5.0,
                    unit: Unit::Piece,
                }],
            )
            .await
            .unwrap();

        let err = ledger.delete_product(&pipe.id).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::ProductInUse { references: 2, .. })
        ));

        ledger.delete_challan(&doc.challan.id).await.unwrap();
        ledger.delete_product(&pipe.id).await.unwrap();
        ledger.delete_product(&spare.id).await.unwrap();

        let err = ledger.get_product(&pipe.id).await.unwrap_err();
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_stock_in_unit_and_convert() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 50.0).await;

        assert_eq!(ledger.stock_in_unit(&pipe.id, Unit::Packet).await.unwrap(), 5.0);
        assert_eq!(ledger.stock_in_unit(&pipe.id, Unit::Linear).await.unwrap(), 2.5);

        let ratios = ConversionRatios::new(2.0, 10.0);
        assert_eq!(
            ledger.convert(4.0, Unit::Packet, Unit::Linear, &ratios).unwrap(),
            2.0
        );
        assert!(ledger
            .convert(1.0, Unit::Linear, Unit::Piece, &ConversionRatios::new(0.0, 10.0))
            .is_err());
    }

    #[tokio::test]
    async fn test_details_edit_bumps_version() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 50.0).await;

        let updated = ledger
            .update_product_details(
                &pipe.id,
                ProductDetails {
                    name: "Pipe".to_string(),
                    size: Some("25mm".to_string()),
                    ratios: ConversionRatios::new(4.0, 12.0),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, pipe.version + 1);
        assert_eq!(updated.quantity, 50.0);
        assert_eq!(updated.display_name(), "Pipe 25mm");
    }

    #[tokio::test]
    async fn test_parties() {
        let (_db, ledger) = fixtures::ledger().await;
        let party = ledger.create_party("Sharma Traders").await.unwrap();

        assert!(ledger.party_exists(&party.id).await.unwrap());
        assert!(!ledger.party_exists("missing").await.unwrap());
        assert_eq!(ledger.list_parties().await.unwrap().len(), 1);
        assert!(ledger.create_party("").await.is_err());
    }
}
