pub mod availability;
pub mod bulk;
pub mod editor;
pub mod limits;
pub mod numbering;
pub mod orders;
pub mod products;
pub mod reports;
pub mod sessions;
pub mod settings;
pub mod status;
