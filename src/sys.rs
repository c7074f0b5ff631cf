pub mod event;
pub mod hyprland;
pub mod signal;
