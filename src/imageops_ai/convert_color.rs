use image::{ImageBuffer, Pixel, Primitive, Rgb};

/// Reorders the first and third channel of every pixel.
///
/// `Rgb<S>` buffers double as BGR storage; this is the only conversion needed
/// between the two orders.
pub trait SwapRedBlue {
    type Output;

    fn swap_red_blue(self) -> Self::Output;

    fn swap_red_blue_mut(&mut self);
}

impl<S> SwapRedBlue for ImageBuffer<Rgb<S>, Vec<S>>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive + 'static,
{
    type Output = ImageBuffer<Rgb<S>, Vec<S>>;

    fn swap_red_blue(mut self) -> Self::Output {
        self.swap_red_blue_mut();
        self
    }

    fn swap_red_blue_mut(&mut self) {
        for Rgb(channels) in self.pixels_mut() {
            channels.swap(0, 2);
        }
    }
}
