use pixels::{Pixels, SurfaceTexture};
use tracing::debug;
use winit::{
    dpi::LogicalSize,
    event::{Event, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
    window::{Window, WindowBuilder},
};
use winit_input_helper::WinitInputHelper;

use crate::{
    error::{Error, Result},
    model::Image,
    render::Surface,
};

const CLOSE_KEYS: [VirtualKeyCode; 4] = [VirtualKeyCode::Escape, VirtualKeyCode::Q, VirtualKeyCode::Return, VirtualKeyCode::Space];

// Field order matters: the pixel surface must go before its window.
struct View {
    pixels: Pixels,
    window: Window,
}

fn display_error<E: std::fmt::Display>(e: E) -> Error {
    return Error::Display(e.to_string());
}

fn fill_frame(frame: &mut [u8], image: &Image<u8>) -> Result<()> {
    match image.channels {
        3 => {
            frame.chunks_exact_mut(4).zip(image.data.chunks_exact(3)).for_each(|(a, b)| {
                a[..3].copy_from_slice(b);
                a[3] = 255;
            });
        }

        1 => {
            frame.chunks_exact_mut(4).zip(&image.data).for_each(|(a, b)| {
                a[0] = *b;
                a[1] = *b;
                a[2] = *b;
                a[3] = 255;
            });
        }

        n => return Err(Error::Display(format!("unsupported number of channels ({n})")))
    }

    return Ok(());
}

/// Opens one window per surface and blocks until a close key is pressed
/// or every window has been closed.
pub fn show_all(surfaces: &[Surface]) -> Result<()> {
    if surfaces.is_empty() {
        return Ok(());
    }

    let mut event_loop = EventLoop::new();
    let mut input = WinitInputHelper::new();
    let mut views = Vec::with_capacity(surfaces.len());

    for surface in surfaces {
        let (width, height) = (surface.image.width as u32, surface.image.height as u32);
        let size = LogicalSize::new(width, height);

        let window = WindowBuilder::new()
            .with_title(&surface.name)
            .with_inner_size(size)
            .with_min_inner_size(size)
            .build(&event_loop)
            .map_err(display_error)?;

        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        let mut pixels = Pixels::new(width, height, surface_texture).map_err(display_error)?;

        fill_frame(pixels.frame_mut(), &surface.image)?;
        window.request_redraw();

        views.push(View { pixels, window });
    }

    debug!(windows = views.len(), "showing surfaces");

    let mut failure = None;

    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match &event {
            Event::RedrawRequested(id) => {
                if let Some(view) = views.iter().find(|v| v.window.id() == *id) {
                    if let Err(e) = view.pixels.render() {
                        failure = Some(display_error(e));
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                }
            }

            Event::WindowEvent { window_id, event: WindowEvent::Resized(size) } => {
                if let Some(view) = views.iter_mut().find(|v| v.window.id() == *window_id) {
                    if let Err(e) = view.pixels.resize_surface(size.width, size.height) {
                        failure = Some(display_error(e));
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    view.window.request_redraw();
                }
            }

            Event::WindowEvent { window_id, event: WindowEvent::CloseRequested } => {
                views.retain(|v| v.window.id() != *window_id);

                if views.is_empty() {
                    *control_flow = ControlFlow::Exit;
                    return;
                }
            }

            _ => {}
        }

        if input.update(&event) && CLOSE_KEYS.iter().any(|k| input.key_pressed(*k)) {
            *control_flow = ControlFlow::Exit;
        }
    });

    return match failure {
        Some(e) => Err(e),
        None => Ok(())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_frames_are_expanded_to_rgba() {
        let mut img = Image::<u8>::zeros(1, 2, 1);
        img.data.copy_from_slice(&[7, 200]);

        let mut frame = vec!(0u8; 8);
        fill_frame(&mut frame, &img).unwrap();

        assert_eq!(frame, vec!(7, 7, 7, 255, 200, 200, 200, 255));
    }

    #[test]
    fn rgb_frames_get_opaque_alpha() {
        let mut img = Image::<u8>::zeros(1, 1, 3);
        img.data.copy_from_slice(&[1, 2, 3]);

        let mut frame = vec!(0u8; 4);
        fill_frame(&mut frame, &img).unwrap();

        assert_eq!(frame, vec!(1, 2, 3, 255));
    }

    #[test]
    fn other_channel_counts_are_rejected() {
        let img = Image::<u8>::zeros(1, 1, 2);
        let mut frame = vec!(0u8; 4);

        assert!(matches!(fill_frame(&mut frame, &img), Err(Error::Display(_))));
    }
}
