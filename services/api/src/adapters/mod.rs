pub mod covers;
pub mod db;
