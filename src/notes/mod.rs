pub mod beats;
pub mod encode;
pub mod smooth;
pub mod table;
pub mod voicing;
