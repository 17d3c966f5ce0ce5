pub mod filter_bar;
pub mod overlay;
