pub mod start_date;
