use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

use inkpanel::driver::build_driver_with;
use inkpanel::framing::CBW_SIGNATURE;
use inkpanel::raster::WHITE;
use inkpanel::transport::mock::MockPanelInfo;
use inkpanel::transport::MockOpener;
use inkpanel::{Bpp, Canvas, Config, DisplayMode, PanelDriver, PanelError, ProtocolError};

#[test]
fn usb_full_panel_draw_is_chunked() {
    let panel = MockPanelInfo {
        width: 1872,
        height: 1404,
        ..MockPanelInfo::default()
    };
    let mut opener = MockOpener::with_panel(panel);
    let mut config = Config::mock("USB", "IT8951");
    config.bpp = Some(8);
    let mut driver = build_driver_with(&config, &mut opener).unwrap();
    let transport = opener.last_usb().unwrap();
    transport.clear_history();

    let mut canvas = Canvas::new(1872, 1404);
    canvas.fill(WHITE);
    driver.draw(0, 0, &canvas, None, true).unwrap();

    // 8bpp pitch is 1872 bytes, 32 rows per strip: ceil(1404 / 32) strips
    let writes = transport.writes();
    let payloads: Vec<&Vec<u8>> = writes.iter().filter(|w| w.len() > 31).collect();
    assert_eq!(payloads.len(), 44);
    assert!(payloads.iter().all(|p| p.len() <= 60 * 1024 - 20));
    assert_eq!(payloads[0].len(), 32 * 1872);
    assert_eq!(payloads[43].len(), 28 * 1872);
}

#[test]
fn usb_tags_increase_per_command() {
    let mut opener = MockOpener::new();
    let mut driver = build_driver_with(&Config::mock("USB", "IT8951"), &mut opener).unwrap();
    let transport = opener.last_usb().unwrap();

    driver.query().unwrap();
    let writes = transport.writes();
    let tags: Vec<u32> = writes
        .iter()
        .filter(|w| w.len() == 31 && w[0..4] == CBW_SIGNATURE)
        .map(|w| u32::from_le_bytes([w[4], w[5], w[6], w[7]]))
        .collect();
    // system info, then the depth setup read and three writes
    assert!(tags.len() >= 5);
    assert!(tags.windows(2).all(|pair| pair[1] == pair[0] + 1));
    assert_eq!(tags[0], 1);
}

#[test]
fn usb_1bpp_rejects_partial_width() {
    let mut opener = MockOpener::new();
    let mut config = Config::mock("USB", "IT8951");
    config.bpp = Some(1);
    let mut driver = build_driver_with(&config, &mut opener).unwrap();
    assert_eq!(driver.bpp(), Bpp::One);

    let canvas = Canvas::new(100, 10);
    assert!(matches!(
        driver.draw(0, 0, &canvas, None, true),
        Err(PanelError::Protocol(ProtocolError::PartialWidth1bpp))
    ));
}

#[test]
fn spi_draws_shapes() {
    let panel = MockPanelInfo {
        width: 64,
        height: 32,
        ..MockPanelInfo::default()
    };
    let mut opener = MockOpener::with_panel(panel);
    let mut config = Config::mock("GPIO", "IT8951");
    config.bpp = Some(4);
    let mut driver = build_driver_with(&config, &mut opener).unwrap();
    let (spi, _) = opener.last_spi().unwrap();
    spi.clear_log();

    let mut canvas = Canvas::new(16, 8);
    canvas.fill(WHITE);
    Rectangle::new(Point::new(0, 0), Size::new(8, 8))
        .into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
        .draw(&mut canvas)
        .unwrap();
    driver
        .draw(8, 8, &canvas, Some(DisplayMode(2)), true)
        .unwrap();

    // 16 pixels at 4bpp is 8 bytes per row
    let written = spi.written_bytes();
    assert!(written.len() > 8 * 8);
    let tail: Vec<u8> = written[written.len() - 4..].to_vec();
    assert_eq!(tail, vec![0x00, 0x00, 0x00, 0x02]);
    driver.close();
}

#[test]
fn usb_odd_width_8bpp_rows_are_not_padded() {
    let mut opener = MockOpener::new();
    let mut config = Config::mock("USB", "IT8951");
    config.bpp = Some(8);
    let mut driver = build_driver_with(&config, &mut opener).unwrap();
    let transport = opener.last_usb().unwrap();
    transport.clear_history();

    let mut canvas = Canvas::new(101, 3);
    canvas.fill(WHITE);
    driver.draw(0, 0, &canvas, None, false).unwrap();

    let writes = transport.writes();
    let upload = &writes[1];
    let header: Vec<u32> = upload[..20]
        .chunks_exact(4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(&header[3..], &[101, 3]);

    // w * h samples followed by one pad byte closing the last packed word
    let pixels = &upload[20..];
    assert_eq!(pixels.len(), 101 * 3 + 1);
    assert_eq!(pixels[101], 0xFF);
    assert_eq!(pixels[202], 0xFF);
    assert_eq!(pixels[303], 0);
}
