pub mod icons;
pub mod render;
pub mod view;
pub mod wayland;
