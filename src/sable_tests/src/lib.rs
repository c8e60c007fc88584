// Cross-crate tests, organized by area.

#[cfg(test)]
mod support;

#[cfg(test)]
mod core_state;
#[cfg(test)]
mod editor;
#[cfg(test)]
mod flow;
#[cfg(test)]
mod parsing;
#[cfg(test)]
mod typing;
