pub mod assets;
pub mod bip21;
pub mod wallet;
