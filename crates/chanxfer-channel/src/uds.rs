use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use chanxfer_frame::{FrameConfig, FrameReader, FrameWriter};
use tracing::{debug, info};

use crate::error::{ChannelError, Result};
use crate::socket::SocketChannel;

/// Default permission mode for created socket paths.
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Listens on a filesystem-path Unix domain socket and accepts channels.
///
/// Every accepted connection must start with an open frame carrying the
/// channel label. The socket file is removed on drop, provided it is still
/// the one this listener created.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    frame_config: FrameConfig,
}

impl SocketListener {
    /// Bind and listen with [`DEFAULT_SOCKET_MODE`].
    ///
    /// If `path` already exists and is a socket, it is removed first (stale
    /// socket cleanup). Any other existing file is left alone and binding
    /// fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path_len(&path)?;

        let bind_err = |source: std::io::Error| ChannelError::Bind {
            path: path.clone(),
            source,
        };

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening for transfer channels");

        Ok(Self {
            listener,
            created_inode: Some((created.dev(), created.ino())),
            path,
            frame_config: FrameConfig::default(),
        })
    }

    /// Use `config` for channels accepted from now on.
    ///
    /// `read_timeout` bounds how long `accept` waits for the open frame.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Accept the next connection and read its open frame (blocking).
    pub fn accept(&self) -> Result<SocketChannel> {
        let (stream, _addr) = self.listener.accept().map_err(ChannelError::Accept)?;
        stream.set_read_timeout(self.frame_config.read_timeout)?;

        let mut reader =
            FrameReader::with_config(stream.try_clone()?, self.frame_config.clone());
        let label = reader.read_open()?;
        debug!(%label, "accepted transfer channel");

        SocketChannel::from_parts(stream, reader, label, self.frame_config.clone())
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}

/// Connect to a listener and open a channel named `label`.
pub fn connect(path: impl AsRef<Path>, label: &str) -> Result<SocketChannel> {
    connect_with_config(path, label, FrameConfig::default())
}

/// Connect with an explicit frame configuration.
pub fn connect_with_config(
    path: impl AsRef<Path>,
    label: &str,
    config: FrameConfig,
) -> Result<SocketChannel> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|source| ChannelError::Connect {
        path: path.to_path_buf(),
        source,
    })?;
    stream.set_write_timeout(config.write_timeout)?;

    let mut opener = FrameWriter::with_config(stream.try_clone()?, config.clone());
    opener.write_open(label)?;
    debug!(?path, %label, "connected transfer channel");

    let reader = FrameReader::with_config(stream.try_clone()?, config.clone());
    SocketChannel::from_parts(stream, reader, label.to_string(), config)
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(ChannelError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Channel, ChannelEvent};
    use chanxfer_frame::ChannelMessage;
    use std::time::Duration;

    fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chanxfer-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn accept_reads_label_and_messages() {
        let dir = test_dir("uds-accept");
        let sock_path = dir.join("accept.sock");
        let listener = SocketListener::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut client = connect(&path_clone, "report.pdf").unwrap();
            client.send(ChannelMessage::from("hello")).unwrap();
            client.close().unwrap();
        });

        let mut server = listener.accept().unwrap();
        assert_eq!(server.label(), "report.pdf");

        let timeout = Some(Duration::from_secs(5));
        assert!(matches!(
            server.next_event(timeout).unwrap(),
            Some(ChannelEvent::Open)
        ));
        match server.next_event(timeout).unwrap() {
            Some(ChannelEvent::Message(message)) => {
                assert_eq!(message, ChannelMessage::from("hello"))
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            server.next_event(timeout).unwrap(),
            Some(ChannelEvent::Closed)
        ));

        handle.join().unwrap();
        drop(listener);
        assert!(
            !sock_path.exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = SocketListener::bind(&long_path);
        assert!(matches!(result, Err(ChannelError::PathTooLong { .. })));
    }

    #[test]
    fn default_permissions_hardened() {
        let dir = test_dir("uds-perms");
        let sock_path = dir.join("perm.sock");

        let listener = SocketListener::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let dir = test_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = SocketListener::bind(&sock_path);
        assert!(matches!(result, Err(ChannelError::Bind { .. })));
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_leaves_replaced_path_alone() {
        let dir = test_dir("uds-drop");
        let sock_path = dir.join("drop.sock");

        let listener = SocketListener::bind(&sock_path).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(listener);
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_to_missing_socket_fails() {
        let dir = test_dir("uds-missing");
        let result = connect(dir.join("nobody.sock"), "x");
        assert!(matches!(result, Err(ChannelError::Connect { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
