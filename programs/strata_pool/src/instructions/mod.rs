// programs/strata_pool/src/instructions/mod.rs

pub mod initialize;
pub mod admin;
pub mod credit;
pub mod refresh;
pub mod first_loss;
pub mod tranche;
pub mod epoch;
pub mod views;

pub use initialize::*;
pub use admin::*;
pub use credit::*;
pub use refresh::*;
pub use first_loss::*;
pub use tranche::*;
pub use epoch::*;
pub use views::*;
