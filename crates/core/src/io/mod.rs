//! Reading station tables and grid meshes, writing GeoTIFF surfaces

mod grid;
mod native;
mod stations;

pub use grid::{GridOptions, read_grid, read_grid_from_str};
pub use native::{write_geotiff, write_geotiff_to_buffer};
pub use stations::{StationCsvOptions, is_missing_token, read_stations, read_stations_from_reader};
