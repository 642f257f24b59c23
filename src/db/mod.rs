pub mod db;
pub mod listingdb;

#[cfg(test)]
pub mod test_support;
