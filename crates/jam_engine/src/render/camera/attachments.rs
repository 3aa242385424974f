//! Camera render targets
//!
//! The geometry pass writes into an [`AttachmentSet`]: one framebuffer with
//! four colour attachments and a depth/stencil renderbuffer, all sized to the
//! camera viewport. The optional post-process pass renders the composite into
//! a [`PostProcessTarget`] first. Both are resized together.

use crate::render::backend::{Attachment, RawHandle, TextureFormat, INVALID_HANDLE};
use crate::render::context::RenderContext;
use crate::render::RenderError;

/// Entity id written where nothing was drawn
pub const INVALID_ENTITY: u32 = u32::MAX;

/// Texture unit of the post-process colour texture
pub const POST_PROCESS_TEXTURE_UNIT: u32 = TextureDataType::MaxTextures as u32;

/// Attachments of the geometry pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDataType {
    /// Albedo colour
    Colour = 0,
    /// World-space position
    Location,
    /// World-space normal
    Normals,
    /// Entity id, `u32` per texel
    Picker,
    /// Number of attachments
    MaxTextures,
}

impl TextureDataType {
    /// The four real attachments in order
    pub const ALL: [Self; 4] = [Self::Colour, Self::Location, Self::Normals, Self::Picker];

    /// Colour attachment index, also used as the texture unit
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Storage format of the attachment
    pub const fn format(self) -> TextureFormat {
        match self {
            Self::Colour | Self::Normals | Self::MaxTextures => TextureFormat::Rgba16F,
            Self::Location => TextureFormat::Rgba32F,
            Self::Picker => TextureFormat::R32Ui,
        }
    }

    /// Sampler uniform the lighting material reads the attachment through
    pub const fn sampler_name(self) -> &'static str {
        match self {
            Self::Colour => "u_colour",
            Self::Location => "u_location",
            Self::Normals => "u_normals",
            Self::Picker | Self::MaxTextures => "u_picker",
        }
    }
}

fn pixels(width: f32, height: f32) -> (u32, u32) {
    (width.max(1.0) as u32, height.max(1.0) as u32)
}

/// Multi-attachment framebuffer of the geometry pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSet {
    /// Framebuffer name
    pub frame_buffer: RawHandle,
    /// Depth/stencil renderbuffer
    pub depth_buffer: RawHandle,
    /// Attachment textures in [`TextureDataType::ALL`] order
    pub textures: [RawHandle; 4],
    /// Attachment points in the same order
    pub attachments: [Attachment; 4],
    /// Texture units the lighting material samples from
    pub active_textures: [u32; 4],
    /// Size the textures were allocated with
    pub size: (u32, u32),
}

impl AttachmentSet {
    /// Create the framebuffer, depth buffer and attachment textures
    pub fn create(ctx: &mut RenderContext, width: f32, height: f32) -> Result<Self, RenderError> {
        let frame_buffer = first(ctx.create_frame_buffers(1), "camera framebuffer")?;
        let depth_buffer = first(ctx.create_render_buffers(1), "camera depth buffer")?;
        let mut set = Self {
            frame_buffer,
            depth_buffer,
            textures: [INVALID_HANDLE; 4],
            attachments: TextureDataType::ALL.map(|kind| Attachment::Colour(kind.index())),
            active_textures: TextureDataType::ALL.map(TextureDataType::index),
            size: pixels(width, height),
        };
        let textures = Self::stage(ctx, width, height)?;
        set.commit(ctx, textures, width, height)?;
        Ok(set)
    }

    /// Replace the textures with new ones of the given size
    ///
    /// On failure the set keeps its current textures and size.
    pub fn resize(&mut self, ctx: &mut RenderContext, width: f32, height: f32) -> Result<(), RenderError> {
        let textures = Self::stage(ctx, width, height)?;
        self.commit(ctx, textures, width, height)
    }

    /// Allocate a full set of attachment textures without attaching them
    pub fn stage(ctx: &mut RenderContext, width: f32, height: f32) -> Result<[RawHandle; 4], RenderError> {
        let (width, height) = pixels(width, height);
        let textures: [RawHandle; 4] = ctx
            .create_textures(TextureDataType::ALL.len())
            .try_into()
            .map_err(|_| RenderError::ResourceCreationFailed("camera attachment textures".to_owned()))?;
        for (kind, &texture) in TextureDataType::ALL.iter().zip(&textures) {
            ctx.backend.allocate_texture_2d(texture, width, height, kind.format());
        }
        Ok(textures)
    }

    /// Attach staged textures, then release the ones they replace
    ///
    /// When the framebuffer ends up incomplete the staged textures are
    /// released and the previous attachments are restored.
    pub fn commit(
        &mut self,
        ctx: &mut RenderContext,
        textures: [RawHandle; 4],
        width: f32,
        height: f32,
    ) -> Result<(), RenderError> {
        let size = pixels(width, height);
        self.attach(ctx, &textures, size);
        if !ctx.backend.framebuffer_complete(self.frame_buffer) {
            ctx.resources.release_textures(ctx.backend.as_mut(), &textures);
            if self.textures[0] != INVALID_HANDLE {
                let previous = self.textures;
                self.attach(ctx, &previous, self.size);
            }
            return Err(RenderError::IncompleteFramebuffer(self.frame_buffer));
        }

        let old = std::mem::replace(&mut self.textures, textures);
        self.size = size;
        if old[0] != INVALID_HANDLE {
            ctx.resources.release_textures(ctx.backend.as_mut(), &old);
        }
        log::debug!("Camera attachments allocated at {}x{}", size.0, size.1);
        Ok(())
    }

    /// Texture of one attachment
    pub fn texture(&self, kind: TextureDataType) -> Option<RawHandle> {
        self.textures.get(kind.index() as usize).copied()
    }

    fn attach(&self, ctx: &mut RenderContext, textures: &[RawHandle; 4], (width, height): (u32, u32)) {
        let device = ctx.backend.as_mut();
        for (kind, &texture) in TextureDataType::ALL.iter().zip(textures) {
            device.attach_texture(self.frame_buffer, Attachment::Colour(kind.index()), texture, None);
        }
        device.allocate_render_buffer(self.depth_buffer, width, height, TextureFormat::Depth24Stencil8);
        device.attach_render_buffer(self.frame_buffer, Attachment::DepthStencil, self.depth_buffer);
        device.set_draw_buffers(self.frame_buffer, &TextureDataType::ALL.map(TextureDataType::index));
    }
}

/// Intermediate target of the post-process pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessTarget {
    /// Framebuffer name
    pub frame_buffer: RawHandle,
    /// Colour texture sampled by the post-process material
    pub texture: RawHandle,
    /// Attachment point of the texture
    pub attachment: Attachment,
    /// Texture unit the post-process material samples from
    pub active_texture: u32,
    /// Size the texture was allocated with
    pub size: (u32, u32),
}

impl PostProcessTarget {
    /// Create the framebuffer and its colour texture
    pub fn create(ctx: &mut RenderContext, width: f32, height: f32) -> Result<Self, RenderError> {
        let frame_buffer = first(ctx.create_frame_buffers(1), "post-process framebuffer")?;
        let mut target = Self {
            frame_buffer,
            texture: INVALID_HANDLE,
            attachment: Attachment::Colour(0),
            active_texture: POST_PROCESS_TEXTURE_UNIT,
            size: pixels(width, height),
        };
        let texture = Self::stage(ctx, width, height)?;
        target.commit(ctx, texture, width, height)?;
        Ok(target)
    }

    /// Replace the texture with a new one of the given size
    ///
    /// On failure the target keeps its current texture and size.
    pub fn resize(&mut self, ctx: &mut RenderContext, width: f32, height: f32) -> Result<(), RenderError> {
        let texture = Self::stage(ctx, width, height)?;
        self.commit(ctx, texture, width, height)
    }

    /// Allocate a colour texture without attaching it
    pub fn stage(ctx: &mut RenderContext, width: f32, height: f32) -> Result<RawHandle, RenderError> {
        let (width, height) = pixels(width, height);
        let texture = first(ctx.create_textures(1), "post-process texture")?;
        ctx.backend.allocate_texture_2d(texture, width, height, TextureFormat::Rgba16F);
        Ok(texture)
    }

    /// Attach a staged texture, then release the one it replaces
    pub fn commit(&mut self, ctx: &mut RenderContext, texture: RawHandle, width: f32, height: f32) -> Result<(), RenderError> {
        let device = ctx.backend.as_mut();
        device.attach_texture(self.frame_buffer, self.attachment, texture, None);
        device.set_draw_buffers(self.frame_buffer, &[0]);
        if !device.framebuffer_complete(self.frame_buffer) {
            if self.texture != INVALID_HANDLE {
                device.attach_texture(self.frame_buffer, self.attachment, self.texture, None);
            }
            ctx.resources.release_textures(ctx.backend.as_mut(), &[texture]);
            return Err(RenderError::IncompleteFramebuffer(self.frame_buffer));
        }

        let old = std::mem::replace(&mut self.texture, texture);
        self.size = pixels(width, height);
        if old != INVALID_HANDLE {
            ctx.resources.release_textures(ctx.backend.as_mut(), &[old]);
        }
        Ok(())
    }
}

fn first(handles: Vec<RawHandle>, what: &str) -> Result<RawHandle, RenderError> {
    handles
        .first()
        .copied()
        .ok_or_else(|| RenderError::ResourceCreationFailed(what.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{GraphicsBackend, HeadlessBackend, ResourceKind};

    fn context() -> RenderContext {
        RenderContext::new(Box::new(HeadlessBackend::new()))
    }

    #[test]
    fn test_attachment_set_is_complete() {
        let mut ctx = context();
        let set = AttachmentSet::create(&mut ctx, 320.0, 200.0).expect("attachments");

        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert!(device.framebuffer_complete(set.frame_buffer));
        assert_eq!(device.framebuffer_size(set.frame_buffer), Some((320, 200)));
        assert_eq!(device.draw_buffers(set.frame_buffer), Some(&[0, 1, 2, 3][..]));
        let picker = set.texture(TextureDataType::Picker).expect("picker texture");
        assert_eq!(device.texture_info(picker).map(|i| i.format), Some(TextureFormat::R32Ui));
    }

    #[test]
    fn test_resize_replaces_textures() {
        let mut ctx = context();
        let mut set = AttachmentSet::create(&mut ctx, 64.0, 64.0).expect("attachments");
        let old = set.textures;

        set.resize(&mut ctx, 128.0, 32.0).expect("resize");

        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert!(old.iter().all(|t| !device.is_live(ResourceKind::Texture, *t)));
        assert_eq!(device.framebuffer_size(set.frame_buffer), Some((128, 32)));
        assert_eq!(
            device.render_buffer_info(set.depth_buffer).map(|info| (info.width, info.height)),
            Some((128, 32))
        );
        assert_eq!(ctx.resources.len(ResourceKind::Texture), 4);
    }

    #[test]
    fn test_post_process_target_resize() {
        let mut ctx = context();
        let mut target = PostProcessTarget::create(&mut ctx, 10.0, 10.0).expect("post-process target");
        let old = target.texture;

        target.resize(&mut ctx, 20.0, 15.0).expect("resize");

        assert_ne!(target.texture, old);
        assert_eq!(target.size, (20, 15));
        assert_eq!(ctx.resources.len(ResourceKind::Texture), 1);
    }

    #[test]
    fn test_failed_resize_keeps_attachments() {
        let mut ctx = context();
        let mut set = AttachmentSet::create(&mut ctx, 64.0, 48.0).expect("attachments");
        let before = set.clone();
        ctx.backend_as_mut::<HeadlessBackend>().expect("headless device").set_context_current(false);

        assert!(set.resize(&mut ctx, 200.0, 100.0).is_err());

        assert_eq!(set, before);
        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert!(set.textures.iter().all(|t| device.is_live(ResourceKind::Texture, *t)));
        assert_eq!(device.framebuffer_size(set.frame_buffer), Some((64, 48)));
    }
}
