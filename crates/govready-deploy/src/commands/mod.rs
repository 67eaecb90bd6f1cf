pub mod check;
pub mod down;
pub mod up;
