//! Whole-kernel scenarios driven on the cooperative host machine.

mod helpers;
