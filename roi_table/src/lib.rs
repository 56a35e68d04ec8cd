pub mod roi_table;
