use core::convert::Infallible;

use embassy_nrf::gpio::{Flex, OutputDrive, Pull};
use embassy_nrf::peripherals;
use pin_manager::PinFactory;

use crate::board::KeyLineResources;

/// Destructor token for recovering the key line pin.
pub struct KeyLineDestructor;

/// Configures the key contact as an open-drain input/output.
pub struct KeyLineFactory;

impl PinFactory for KeyLineFactory {
    type Pin = Flex<'static>;
    type Resources = KeyLineResources;
    type Destructor = KeyLineDestructor;
    type Error = Infallible;

    fn create(
        resources: Self::Resources,
    ) -> Result<(Self::Pin, Self::Destructor), (Self::Error, Self::Resources)>
    {
        let mut pin = Flex::new(resources.pin);
        // Released before the output stage is connected.
        pin.set_high();
        pin.set_as_input_output(Pull::Up, OutputDrive::Standard0Disconnect1);
        Ok((pin, KeyLineDestructor))
    }

    fn recover(_destructor: Self::Destructor) -> Self::Resources {
        // SAFETY: The Flex has been dropped (PinManager drops the pin before
        // calling recover), which disconnected it. Nothing else holds P0_31.
        unsafe { KeyLineResources { pin: peripherals::P0_31::steal() } }
    }
}
