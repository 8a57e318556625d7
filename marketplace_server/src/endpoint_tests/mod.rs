mod helpers;

mod directory;
mod loyalty;
mod orders;
mod payments;
mod products;
