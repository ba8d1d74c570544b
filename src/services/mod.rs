pub mod signing;
pub mod storage_service;
