//! An `AssetFactory` without any device behind it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::utils::prelude::HandlePool;

use super::assets::*;
use super::file::FileHandle;

/// Counters shared between a `HeadlessFactory` and whoever watches it.
#[derive(Debug, Default)]
pub struct HeadlessStats {
    pub textures: AtomicUsize,
    pub fonts: AtomicUsize,
    pub sounds: AtomicUsize,
    /// Objects destroyed twice, or never created.
    pub bad_destroys: AtomicUsize,
    /// Total bytes handed to parsers.
    pub parsed_bytes: AtomicUsize,
}

impl HeadlessStats {
    /// Number of device objects alive.
    pub fn live(&self) -> usize {
        self.textures.load(Ordering::SeqCst)
            + self.fonts.load(Ordering::SeqCst)
            + self.sounds.load(Ordering::SeqCst)
    }

    pub fn bad_destroys(&self) -> usize {
        self.bad_destroys.load(Ordering::SeqCst)
    }
}

/// Accepts any non-empty input and hands out fresh handles for it.
#[derive(Default)]
pub struct HeadlessFactory {
    textures: HandlePool<TextureHandle>,
    fonts: HandlePool<FontHandle>,
    sounds: HandlePool<SoundHandle>,
    stats: Arc<HeadlessStats>,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        HeadlessFactory::default()
    }

    pub fn stats(&self) -> Arc<HeadlessStats> {
        self.stats.clone()
    }

    fn check(&self, bytes: &[u8]) -> ::std::result::Result<(), failure::Error> {
        if bytes.is_empty() {
            bail!("Can not parse an empty buffer.");
        }

        self.stats.parsed_bytes.fetch_add(bytes.len(), Ordering::SeqCst);
        Ok(())
    }

    fn new_texture(&mut self) -> TextureHandle {
        self.stats.textures.fetch_add(1, Ordering::SeqCst);
        self.textures.create()
    }

    fn new_font(&mut self) -> FontHandle {
        self.stats.fonts.fetch_add(1, Ordering::SeqCst);
        self.fonts.create()
    }

    fn new_sound(&mut self) -> SoundHandle {
        self.stats.sounds.fetch_add(1, Ordering::SeqCst);
        self.sounds.create()
    }

    fn release(freed: bool, counter: &AtomicUsize, stats: &HeadlessStats) {
        if freed {
            counter.fetch_sub(1, Ordering::SeqCst);
        } else {
            stats.bad_destroys.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl AssetFactory for HeadlessFactory {
    fn parse_texture(
        &mut self,
        bytes: &[u8],
        _: bool,
    ) -> ::std::result::Result<TextureHandle, failure::Error> {
        self.check(bytes)?;
        Ok(self.new_texture())
    }

    fn parse_bitmap_font(
        &mut self,
        bytes: &[u8],
    ) -> ::std::result::Result<FontHandle, failure::Error> {
        self.check(bytes)?;
        Ok(self.new_font())
    }

    fn parse_freetype_font(
        &mut self,
        bytes: &[u8],
    ) -> ::std::result::Result<FontHandle, failure::Error> {
        self.check(bytes)?;
        Ok(self.new_font())
    }

    fn create_sound(&mut self, bytes: Vec<u8>) -> ::std::result::Result<SoundHandle, failure::Error> {
        self.check(&bytes)?;
        Ok(self.new_sound())
    }

    fn create_sound_stream(
        &mut self,
        file: FileHandle,
        offset: u64,
        len: u64,
    ) -> ::std::result::Result<SoundHandle, failure::Error> {
        if len == 0 || offset + len > file.size() {
            bail!("Stream {}+{} is out of {:?}.", offset, len, file.path());
        }

        Ok(self.new_sound())
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
    ) -> ::std::result::Result<TextureHandle, failure::Error> {
        if width == 0 || height == 0 {
            bail!("Texture of {}x{} has no pixels.", width, height);
        }

        Ok(self.new_texture())
    }

    fn create_texture_from_display(
        &mut self,
    ) -> ::std::result::Result<TextureHandle, failure::Error> {
        Ok(self.new_texture())
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        let freed = self.textures.free(handle);
        Self::release(freed, &self.stats.textures, &self.stats);
    }

    fn destroy_font(&mut self, handle: FontHandle) {
        let freed = self.fonts.free(handle);
        Self::release(freed, &self.stats.fonts, &self.stats);
    }

    fn destroy_sound(&mut self, handle: SoundHandle) {
        let freed = self.sounds.free(handle);
        Self::release(freed, &self.stats.sounds, &self.stats);
    }
}
