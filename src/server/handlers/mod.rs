pub mod bids;
pub mod rides;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}
