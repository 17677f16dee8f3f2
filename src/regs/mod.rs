pub mod max86150;
