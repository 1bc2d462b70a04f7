/// Abstracts configuring the key line and giving it back.
///
/// `create` turns the raw resources (e.g. a GPIO peripheral) into a driven
/// open-drain pin; `recover` undoes that once the lease is dropped.
pub trait PinFactory {
    /// The configured pin handed to the lease holder.
    type Pin;
    /// Resources needed to create the pin.
    type Resources;
    /// Opaque token that can reconstruct [`Resources`](Self::Resources) after the pin is dropped.
    type Destructor;
    /// Error type for pin creation failures.
    type Error: core::fmt::Debug;

    /// Configure the pin from the given resources.
    ///
    /// On failure, returns the error **and** the original resources so they are not lost.
    fn create(
        resources: Self::Resources,
    ) -> Result<(Self::Pin, Self::Destructor), (Self::Error, Self::Resources)>;

    /// Recover the original resources from a destructor token.
    fn recover(destructor: Self::Destructor) -> Self::Resources;
}
