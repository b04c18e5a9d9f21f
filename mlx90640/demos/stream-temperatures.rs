use std::convert::TryInto;
use std::env;
use std::path::Path;

use anyhow::{bail, Context};
use linux_embedded_hal::I2cdev;
use mlx90640::{
    acquisition, AcquisitionConfig, FrameDecoder, FrameRate, I2cTransport, ProtocolConfig,
    RegisterProtocol, StdClock, WIDTH,
};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        bail!("Arguments: <I2C bus> <camera address> [frame rate] [num_frames]");
    }
    let address: u8 = if let Some(hex_digits) = args[2].strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)?
    } else {
        args[2].parse()?
    };
    let bus = I2cdev::new(Path::new(&args[1]))
        .with_context(|| format!("{} should be an I²C device", args[1]))?;
    let mut config = AcquisitionConfig::default();
    if let Some(frame_rate) = args.get(3) {
        let frame_rate: f32 = frame_rate.parse()?;
        let frame_rate: FrameRate = frame_rate.try_into()?;
        config = config.with_frame_rate(frame_rate);
    }
    let num_frames: u64 = match args.get(4) {
        Some(count) => count.parse()?,
        None => 10,
    };

    let transport = I2cTransport::new(bus, address);
    let mut protocol = RegisterProtocol::new(transport, StdClock::new(), ProtocolConfig::default());
    let calibration = protocol.load_calibration()?;
    let frame_rate = match config.frame_rate {
        Some(frame_rate) => frame_rate,
        None => protocol.frame_rate()?,
    };
    println!("Starting measurements.");
    let handle = acquisition::spawn(protocol, calibration, FrameDecoder::default(), config);

    let mut last_sequence = 0;
    let timeout = frame_rate.period() * 4;
    while last_sequence < num_frames {
        let frame = match handle.wait_for_frame(last_sequence, timeout) {
            Some(frame) => frame,
            None => break,
        };
        last_sequence = frame.sequence();
        let (min, max) = frame.min_max().unwrap_or((f64::NAN, f64::NAN));
        println!(
            "Frame {} ({:?}): ambient {:.2}℃, supply {:.3}V, min {:.2}℃, max {:.2}℃",
            frame.sequence(),
            frame.subpage(),
            frame.ambient_temperature(),
            frame.supply_voltage(),
            min,
            max
        );
        if last_sequence >= num_frames {
            print_temperatures(frame.temperatures(), WIDTH);
        }
    }
    handle.stop()?;
    Ok(())
}

fn print_temperatures(temperatures: &[f64], width: usize) {
    for (count, temperature) in temperatures.iter().enumerate() {
        if count % width == 0 {
            println!();
        }
        print!("{:6.2} ", temperature);
    }
    println!();
}
