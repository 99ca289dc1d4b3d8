pub mod menubar;
pub mod overlay;
