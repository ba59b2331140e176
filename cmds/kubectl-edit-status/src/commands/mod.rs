pub mod edit_status;
