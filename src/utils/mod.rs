pub mod audit;
pub mod db_utils;
pub mod lookup_filter;
pub mod mailer;
pub mod username_cache;
