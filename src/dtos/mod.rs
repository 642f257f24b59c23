pub mod listingdtos;
