mod checksum_tests;
mod header_tests;
