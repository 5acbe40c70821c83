#[cfg(test)]
mod harness;
#[cfg(test)]
mod tests;
