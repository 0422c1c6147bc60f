//! Catalog reference data for activatable products.

/// Read-only product entry owned by the catalog-management process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub product_code: String,
    pub currency: String,
    pub vendor_code: String,
    pub active: bool,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
}

/// Which bound an amount violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountBound {
    Below(i64),
    Above(i64),
}

impl Product {
    pub fn check_amount(&self, amount: i64) -> Result<(), AmountBound> {
        if let Some(min) = self.min_amount {
            if amount < min {
                return Err(AmountBound::Below(min));
            }
        }
        if let Some(max) = self.max_amount {
            if amount > max {
                return Err(AmountBound::Above(max));
            }
        }
        Ok(())
    }
}
