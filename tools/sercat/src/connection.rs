use crate::tag::LogTag;
use serstream::{Device, DeviceFault, DeviceStatus, SerialDevice};
use std::{
    fmt,
    io::{self, Read},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream},
    path::PathBuf,
    time::Duration,
};

/// An open device to read from.
#[derive(Debug)]
pub enum Connection {
    Serial(SerialDevice),
    Tcp(TcpDevice),
}

/// A virtual UART exposed as a TCP socket.
#[derive(Debug)]
pub struct TcpDevice {
    sock: TcpStream,
    name: String,
    nonblocking: bool,
}

/// Describes a device to connect to.
#[derive(Debug, clap::Subcommand)]
pub enum Connect {
    /// connect to a virtual serial port on IP:PORT
    Tcp {
        /// IP address to connect to. This defaults to localhost.
        #[clap(long, default_value_t = Self::DEFAULT_IP)]
        ip: IpAddr,
        /// TCP port to connect to
        #[arg(default_value_t = Self::DEFAULT_TCP_PORT)]
        port: u16,
    },
    /// open the serial port at PATH
    Serial {
        /// path to the serial port device (usually /dev/ttyUSBx for hw)
        path: PathBuf,

        /// baud rate
        #[arg(default_value_t = Self::DEFAULT_BAUD_RATE)]
        baud: u32,
    },
}

impl Connection {
    pub fn log_tag(&self) -> LogTag {
        match self {
            Self::Serial(_) => LogTag::serial(),
            Self::Tcp(_) => LogTag::tcp(),
        }
    }
}

impl Device for Connection {
    fn name(&self) -> &str {
        match self {
            Self::Serial(s) => s.name(),
            Self::Tcp(t) => t.name(),
        }
    }

    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
        match self {
            Self::Serial(s) => s.poll_read(buf, wait),
            Self::Tcp(t) => t.poll_read(buf, wait),
        }
    }

    fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
        match self {
            Self::Serial(s) => s.bytes_available(),
            Self::Tcp(t) => t.bytes_available(),
        }
    }
}

// === impl TcpDevice ===

impl TcpDevice {
    fn new(sock: TcpStream) -> io::Result<Self> {
        let name = sock.peer_addr()?.to_string();
        Ok(Self {
            sock,
            name,
            nonblocking: false,
        })
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        if self.nonblocking != nonblocking {
            self.sock.set_nonblocking(nonblocking)?;
            self.nonblocking = nonblocking;
        }
        Ok(())
    }
}

impl Device for TcpDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
        // `set_read_timeout` rejects a zero duration, so zero-length waits are
        // non-blocking reads instead.
        if wait.is_zero() {
            self.set_nonblocking(true)?;
        } else {
            self.set_nonblocking(false)?;
            self.sock.set_read_timeout(Some(wait))?;
        }

        match self.sock.read(buf) {
            Ok(0) if !buf.is_empty() => Err(DeviceFault::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ))),
            Ok(n) => Ok(DeviceStatus::Data(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(DeviceStatus::WouldBlock)
            }
            Err(e) => Err(DeviceFault::Io(e)),
        }
    }

    fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
        let mut buf = [0u8; 4096];
        self.set_nonblocking(true)?;
        match self.sock.peek(&mut buf) {
            Ok(n) => Ok(n as i64),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(DeviceFault::Io(e)),
        }
    }
}

// === impl Connect ===

impl Connect {
    pub const DEFAULT_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
    pub const DEFAULT_TCP_PORT: u16 = 9999;
    pub const DEFAULT_BAUD_RATE: u32 = 115200;

    pub fn connect(&self) -> io::Result<Connection> {
        match *self {
            Self::Tcp { ip, port } => {
                let addr = SocketAddr::from((ip, port));
                let sock = TcpStream::connect(addr)?;
                Ok(Connection::Tcp(TcpDevice::new(sock)?))
            }
            Self::Serial { ref path, baud } => {
                let path = path.to_str().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "path is not UTF-8")
                })?;
                let port = SerialDevice::open(serialport::new(path, baud))?;
                Ok(Connection::Serial(port))
            }
        }
    }
}

impl fmt::Display for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { ip, port } => write!(f, "{ip}:{port}"),
            Self::Serial { path, baud } => write!(f, "{} (@ {baud})", path.display()),
        }
    }
}
