use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

//a frame that grows past this is garbage, not a jpeg
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

enum SplitJpegState {
    Marker1,      //looking for 0xFF
    Marker2,      //looking for a second marker byte
    Size1,        //looking for first byte of payload size
    Size2(u8),    //looking for second byte of payload size
    Payload(u16), //iterating through a payload following a marker for n remaining bytes
    EntropyCoded, //iterating through entropy-coded data for 0xFF
    EcEscape,     //checking of next byte of 0x00 to escape entropy coded data
}

///Reads a stream of concatenated jpegs (ffmpeg `image2pipe` output) and publishes each complete
///image to `frames`. Latest wins: a slow reader skips frames instead of backing up the pipe.
///
///The task ends, dropping `frames`, when the stream hits EOF or errors, or when every receiver
///is gone.
pub fn split_jpegs(
    mut byte_stream: impl AsyncRead + Send + Unpin + 'static,
    frames: watch::Sender<Option<Bytes>>,
) -> JoinHandle<()> {
    let buffer_size: usize = 8192;
    let mut buf: Vec<u8> = vec![0; buffer_size];

    let frame_capacity: usize = 64 * 1024;
    let mut frame: Vec<u8> = Vec::with_capacity(frame_capacity);

    let mut state = SplitJpegState::Marker1;

    tokio::spawn(async move {
        'read: loop {
            let bytes = match byte_stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("jpeg stream read failed: {}", err);
                    break;
                }
            };

            let mut i = 0;
            while i < bytes {
                let b = buf[i];
                match state {
                    SplitJpegState::Marker1 => {
                        if b == 0xFF {
                            frame.push(b);
                            state = SplitJpegState::Marker2;
                        }
                        i += 1;
                    }

                    SplitJpegState::Marker2 => {
                        if b == 0xD8 {
                            //start of image, drop anything half-read before it
                            frame.clear();
                            frame.extend_from_slice(&[0xFF, 0xD8]);
                            state = SplitJpegState::Marker1;
                        } else if b == 0xD9 {
                            //end of image!
                            state = SplitJpegState::Marker1;
                            frame.push(b);

                            let image = Bytes::copy_from_slice(&frame);
                            frame.clear();
                            if frames.send(Some(image)).is_err() {
                                debug!("no frame receivers left");
                                break 'read;
                            }
                        } else if b == 0xFF {
                            //fill byte, still looking for the marker
                        } else if (0xD0..=0xD7).contains(&b) || b == 0x01 {
                            //markers without a size
                            state = SplitJpegState::Marker1;
                            frame.push(b);
                        } else if b == 0xDA {
                            //begin entropy coded data
                            state = SplitJpegState::EntropyCoded;
                            frame.push(b);
                        } else {
                            //some other sized block of data
                            state = SplitJpegState::Size1;
                            frame.push(b);
                        }
                        i += 1;
                    }

                    SplitJpegState::Size1 => {
                        state = SplitJpegState::Size2(b);
                        frame.push(b);
                        i += 1;
                    }

                    SplitJpegState::Size2(first_byte) => {
                        //remaining bytes minus two for payload size
                        state = SplitJpegState::Payload(
                            ((first_byte as u16) << 8 | (b as u16)).saturating_sub(2),
                        );
                        frame.push(b);
                        i += 1;
                    }

                    SplitJpegState::Payload(remaining_bytes) => {
                        if remaining_bytes == 0 {
                            state = SplitJpegState::Marker1;
                        } else {
                            state = SplitJpegState::Payload(remaining_bytes - 1);
                            i += 1;
                            frame.push(b);
                        }
                    }

                    SplitJpegState::EntropyCoded => {
                        if b == 0xFF {
                            state = SplitJpegState::EcEscape;
                        }
                        frame.push(b);
                        i += 1;
                    }

                    SplitJpegState::EcEscape => {
                        if b == 0x00 {
                            state = SplitJpegState::EntropyCoded;
                            frame.push(b);
                            i += 1;
                        } else {
                            state = SplitJpegState::Marker2;
                        }
                    }
                }

                if frame.len() > MAX_FRAME_BYTES {
                    warn!("discarding oversized frame ({} bytes)", frame.len());
                    frame.clear();
                    state = SplitJpegState::Marker1;
                }
            }
        }
        debug!("jpeg stream ended.")
    })
}
