/// Pointer capability a card exposes to the page adapter. Coordinates are
/// logical page coordinates, the same space as [`crate::LayoutBox`].
pub trait InputPort {
    fn on_pointer_enter(&mut self);
    fn on_pointer_leave(&mut self);
    fn on_pointer_move(&mut self, x: f32, y: f32);
    /// The card's action link was activated.
    fn on_action_triggered(&mut self);
}
