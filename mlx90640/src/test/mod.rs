mod i2c_mock;

pub(crate) use clock::FakeClock;
pub(crate) use i2c_mock::{datasheet_camera, BusOperation, MockCameraBus, MockError};
