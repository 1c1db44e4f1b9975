//! Bulk-only USB transport on top of `nusb`
use futures::executor::block_on;
use nusb::transfer::RequestBuffer;

use crate::config::UsbParams;
use crate::error::TransportError;
use crate::transport::Transport;

/// Claimed interface of the USB bridge board.
pub struct UsbTransport {
    interface: Option<nusb::Interface>,
    endpoint_in: u8,
    endpoint_out: u8,
}

impl UsbTransport {
    /// Find the board by vendor/product id, reset it and claim its interface.
    pub fn open(params: &UsbParams) -> Result<Self, TransportError> {
        let info = nusb::list_devices()?
            .find(|dev| {
                dev.vendor_id() == params.vendor_id && dev.product_id() == params.product_id
            })
            .ok_or(TransportError::DeviceNotFound {
                vendor_id: params.vendor_id,
                product_id: params.product_id,
            })?;

        log::info!(
            "Opening USB device {:04x}:{:04x} on bus {} address {}",
            params.vendor_id,
            params.product_id,
            info.bus_number(),
            info.device_address()
        );

        let device = info.open()?;
        device.reset()?;
        let interface = device.detach_and_claim_interface(params.interface)?;

        Ok(UsbTransport {
            interface: Some(interface),
            endpoint_in: params.endpoint_in,
            endpoint_out: params.endpoint_out,
        })
    }

    fn interface(&self) -> Result<&nusb::Interface, TransportError> {
        self.interface.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for UsbTransport {
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let interface = self.interface()?;
        let data = block_on(interface.bulk_in(self.endpoint_in, RequestBuffer::new(len)))
            .into_result()?;
        if data.len() < len {
            return Err(TransportError::ShortRead {
                wanted: len,
                got: data.len(),
            });
        }
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let interface = self.interface()?;
        let completion = block_on(interface.bulk_out(self.endpoint_out, data.to_vec()));
        Ok(completion.into_result()?.actual_length())
    }

    /// Drops the claimed interface, which releases it.
    fn close(&mut self) -> Result<(), TransportError> {
        if self.interface.take().is_some() {
            log::info!("Released USB interface");
        }
        Ok(())
    }
}
