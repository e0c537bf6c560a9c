mod helpers;

mod driver_tests;
