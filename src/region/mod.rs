/*!
 * Shared Memory Region
 * Bounds- and alignment-checked atomic cells shared between agents
 */

mod region;
mod types;

pub use region::SharedRegion;
pub use types::{CellValue, CellWidth, RegionError, RegionId, MAX_REGION_SIZE};
