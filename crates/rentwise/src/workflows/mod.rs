pub mod leasing;
