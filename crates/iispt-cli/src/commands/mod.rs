pub mod compare;
pub mod evaluate;
pub mod index;
pub mod serve;
pub mod tonemap;
