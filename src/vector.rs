//! Logical vectors spanning host and device memory.
//!
//! A [`Vector`] is a fixed-length numeric array whose storage may live on
//! the host, on the device, or on both. Each side carries a validity flag;
//! leasing a side that is not valid first synchronizes it by copying from
//! the valid side (allocating the target lazily), so callers always observe
//! one coherent value.
//!
//! Host elements are [`Scalar`] (`f64`); device buffers hold
//! [`DeviceScalar`] (`f32`) and values are cast at every synchronization
//! boundary.
//!
//! # Leases
//!
//! Access goes through RAII lease guards ([`HostRead`], [`HostWrite`],
//! [`DeviceRead`], [`DeviceWrite`]). A guard releases its lease on every
//! exit path, including panics; writable guards invalidate the opposite
//! side. [`Vector::lease_count`] exposes the outstanding-lease counter.
//!
//! # Borrowed host arrays
//!
//! [`Vector::set_array_borrowed`] attaches a shared `Arc<[Scalar]>` the
//! vector never frees or mutates: the first writable host lease promotes the
//! contents to an owned copy, leaving the caller's array untouched.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::Scalar;

#[cfg(feature = "wgpu")]
use crate::{gpu::GpuContext, DeviceScalar};

/// Host-side storage state.
enum HostBuffer {
    /// Nothing allocated yet.
    None,
    /// Heap storage owned by the vector.
    Owned(Vec<Scalar>),
    /// Caller-shared storage; released but never freed or written.
    Borrowed(Arc<[Scalar]>),
}

#[cfg(feature = "wgpu")]
struct DeviceSide {
    ctx: Arc<GpuContext>,
    buffer: Option<wgpu::Buffer>,
}

#[cfg(feature = "wgpu")]
impl DeviceSide {
    /// Lazily allocates the storage buffer. Fresh wgpu buffers read as
    /// zeros.
    fn ensure_buffer(&mut self, len: usize) {
        if self.buffer.is_none() {
            self.buffer = Some(self.ctx.create_storage_buffer(len));
        }
    }

    fn upload(&mut self, len: usize, data: &[DeviceScalar]) {
        self.ensure_buffer(len);
        if let Some(buffer) = &self.buffer {
            self.ctx.upload(buffer, data);
        }
    }

    fn read(&mut self, len: usize) -> Result<Vec<DeviceScalar>> {
        self.ensure_buffer(len);
        match &self.buffer {
            Some(buffer) => self.ctx.read_buffer(buffer, len),
            None => Ok(vec![0.0; len]),
        }
    }
}

/// A logical numeric array with lazy host/device residency.
pub struct Vector {
    len: usize,
    host: HostBuffer,
    host_valid: bool,
    #[cfg(feature = "wgpu")]
    device: Option<DeviceSide>,
    device_valid: bool,
    host_leases: u32,
    device_leases: u32,
}

impl Vector {
    /// A host-only vector of `len` elements. No buffer is allocated until
    /// first use.
    pub fn new_host(len: usize) -> Self {
        Self {
            len,
            host: HostBuffer::None,
            host_valid: false,
            #[cfg(feature = "wgpu")]
            device: None,
            device_valid: false,
            host_leases: 0,
            device_leases: 0,
        }
    }

    /// A vector that may also reside on `ctx`'s device.
    #[cfg(feature = "wgpu")]
    pub fn new_device(len: usize, ctx: Arc<GpuContext>) -> Self {
        let mut v = Self::new_host(len);
        v.device = Some(DeviceSide { ctx, buffer: None });
        v
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds zero elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Outstanding host + device leases. Zero whenever every acquired guard
    /// has been released.
    pub fn lease_count(&self) -> u32 {
        self.host_leases + self.device_leases
    }

    /// Whether this vector can reside on a device.
    pub fn has_device(&self) -> bool {
        #[cfg(feature = "wgpu")]
        {
            self.device.is_some()
        }
        #[cfg(not(feature = "wgpu"))]
        {
            false
        }
    }

    /// Attaches an owned host array, invalidating any device copy.
    pub fn set_array(&mut self, data: Vec<Scalar>) -> Result<()> {
        self.check_len(data.len())?;
        self.host = HostBuffer::Owned(data);
        self.host_valid = true;
        self.device_valid = false;
        Ok(())
    }

    /// Attaches a caller-shared host array, invalidating any device copy.
    /// The shared storage is never freed or mutated by the vector.
    pub fn set_array_borrowed(&mut self, data: Arc<[Scalar]>) -> Result<()> {
        self.check_len(data.len())?;
        self.host = HostBuffer::Borrowed(data);
        self.host_valid = true;
        self.device_valid = false;
        Ok(())
    }

    /// Uploads `data` to the device buffer, invalidating the host copy.
    #[cfg(feature = "wgpu")]
    pub fn set_array_device(&mut self, data: &[DeviceScalar]) -> Result<()> {
        self.check_len(data.len())?;
        let len = self.len;
        let side = self.device_side()?;
        side.upload(len, data);
        self.device_valid = true;
        self.host_valid = false;
        Ok(())
    }

    /// Read-only host lease. Synchronizes from the device when the host
    /// side is invalid; the device copy stays valid.
    pub fn read_host(&mut self) -> Result<HostRead<'_>> {
        self.ensure_host_valid()?;
        self.host_leases += 1;
        Ok(HostRead { vec: self })
    }

    /// Writable host lease. Synchronizes first, then invalidates the device
    /// copy since the caller may write. Borrowed storage is promoted to an
    /// owned copy.
    pub fn write_host(&mut self) -> Result<HostWrite<'_>> {
        self.ensure_host_valid()?;
        self.promote_borrowed();
        self.device_valid = false;
        self.host_leases += 1;
        Ok(HostWrite { vec: self })
    }

    /// Read-only device lease: a synchronized snapshot of the device
    /// buffer. The host copy stays valid.
    #[cfg(feature = "wgpu")]
    pub fn read_device(&mut self) -> Result<DeviceRead<'_>> {
        self.ensure_device_valid()?;
        let data = self.readback()?;
        self.device_leases += 1;
        Ok(DeviceRead { vec: self, data })
    }

    /// Writable device lease. The staged values are uploaded when the guard
    /// drops; the host copy is invalidated.
    #[cfg(feature = "wgpu")]
    pub fn write_device(&mut self) -> Result<DeviceWrite<'_>> {
        self.ensure_device_valid()?;
        let data = self.readback()?;
        self.host_valid = false;
        self.device_leases += 1;
        Ok(DeviceWrite { vec: self, data })
    }

    /// The raw device buffer, if one has been allocated. Kernel launches
    /// bind this directly.
    #[cfg(feature = "wgpu")]
    pub fn device_buffer(&self) -> Option<&wgpu::Buffer> {
        self.device.as_ref()?.buffer.as_ref()
    }

    fn check_len(&self, n: usize) -> Result<()> {
        if n != self.len {
            return Err(Error::usage(format!(
                "array of {n} elements attached to vector of length {}",
                self.len
            )));
        }
        Ok(())
    }

    /// Copy-on-write for borrowed storage ahead of mutation.
    fn promote_borrowed(&mut self) {
        if let HostBuffer::Borrowed(shared) = &self.host {
            self.host = HostBuffer::Owned(shared.to_vec());
        }
    }

    fn host_slice(&self) -> &[Scalar] {
        match &self.host {
            HostBuffer::Owned(v) => v,
            HostBuffer::Borrowed(a) => a,
            HostBuffer::None => &[],
        }
    }

    fn host_slice_mut(&mut self) -> &mut [Scalar] {
        match &mut self.host {
            HostBuffer::Owned(v) => v,
            // write_host promotes before handing out the guard.
            _ => &mut [],
        }
    }

    /// Makes the host side valid: copies back from the device if that is
    /// the valid side, or allocates zeros for a never-written vector.
    fn ensure_host_valid(&mut self) -> Result<()> {
        if self.host_valid {
            if matches!(self.host, HostBuffer::None) {
                self.host = HostBuffer::Owned(vec![0.0; self.len]);
            }
            return Ok(());
        }
        #[cfg(feature = "wgpu")]
        if self.device_valid {
            let data = self.readback()?;
            self.host = HostBuffer::Owned(data.iter().map(|&x| Scalar::from(x)).collect());
            self.host_valid = true;
            return Ok(());
        }
        // Never written: zero-fill.
        self.host = HostBuffer::Owned(vec![0.0; self.len]);
        self.host_valid = true;
        Ok(())
    }

    /// Makes the device side valid, uploading the host copy if that is the
    /// valid side. A never-written vector gets a zeroed buffer.
    #[cfg(feature = "wgpu")]
    fn ensure_device_valid(&mut self) -> Result<()> {
        if self.device.is_none() {
            return Err(Error::config(
                "vector was created by a host-only backend; device location is unavailable",
            ));
        }
        let len = self.len;
        if self.device_valid {
            // Buffer may still be unallocated if flags were set externally.
            if let Some(side) = self.device.as_mut() {
                side.ensure_buffer(len);
            }
            return Ok(());
        }
        if self.host_valid {
            let staged: Vec<DeviceScalar> =
                self.host_slice().iter().map(|&x| x as DeviceScalar).collect();
            if let Some(side) = self.device.as_mut() {
                side.upload(len, &staged);
            }
        } else if let Some(side) = self.device.as_mut() {
            side.ensure_buffer(len);
        }
        self.device_valid = true;
        Ok(())
    }

    #[cfg(feature = "wgpu")]
    fn device_side(&mut self) -> Result<&mut DeviceSide> {
        self.device.as_mut().ok_or_else(|| {
            Error::config(
                "vector was created by a host-only backend; device location is unavailable",
            )
        })
    }

    #[cfg(feature = "wgpu")]
    fn readback(&mut self) -> Result<Vec<DeviceScalar>> {
        let len = self.len;
        match self.device.as_mut() {
            Some(side) => side.read(len),
            None => Ok(vec![0.0; len]),
        }
    }
}

impl Drop for Vector {
    fn drop(&mut self) {
        // Guards borrow the vector, so outstanding leases here mean a guard
        // was leaked with mem::forget.
        debug_assert_eq!(self.lease_count(), 0, "vector dropped while leased");
        // Owned buffers fall out of scope; borrowed storage is an Arc clone
        // and the caller's copy survives untouched.
    }
}

impl core::fmt::Debug for Vector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vector")
            .field("len", &self.len)
            .field("host_valid", &self.host_valid)
            .field("device_valid", &self.device_valid)
            .field("leases", &self.lease_count())
            .finish()
    }
}

/// Read-only host lease.
pub struct HostRead<'a> {
    vec: &'a mut Vector,
}

impl core::ops::Deref for HostRead<'_> {
    type Target = [Scalar];

    fn deref(&self) -> &[Scalar] {
        self.vec.host_slice()
    }
}

impl Drop for HostRead<'_> {
    fn drop(&mut self) {
        self.vec.host_leases -= 1;
    }
}

/// Writable host lease.
pub struct HostWrite<'a> {
    vec: &'a mut Vector,
}

impl core::ops::Deref for HostWrite<'_> {
    type Target = [Scalar];

    fn deref(&self) -> &[Scalar] {
        self.vec.host_slice()
    }
}

impl core::ops::DerefMut for HostWrite<'_> {
    fn deref_mut(&mut self) -> &mut [Scalar] {
        self.vec.host_slice_mut()
    }
}

impl Drop for HostWrite<'_> {
    fn drop(&mut self) {
        self.vec.host_leases -= 1;
    }
}

/// Read-only device lease holding a synchronized snapshot.
#[cfg(feature = "wgpu")]
pub struct DeviceRead<'a> {
    vec: &'a mut Vector,
    data: Vec<DeviceScalar>,
}

#[cfg(feature = "wgpu")]
impl core::ops::Deref for DeviceRead<'_> {
    type Target = [DeviceScalar];

    fn deref(&self) -> &[DeviceScalar] {
        &self.data
    }
}

#[cfg(feature = "wgpu")]
impl Drop for DeviceRead<'_> {
    fn drop(&mut self) {
        self.vec.device_leases -= 1;
    }
}

/// Writable device lease; staged values upload when the guard drops.
#[cfg(feature = "wgpu")]
pub struct DeviceWrite<'a> {
    vec: &'a mut Vector,
    data: Vec<DeviceScalar>,
}

#[cfg(feature = "wgpu")]
impl core::ops::Deref for DeviceWrite<'_> {
    type Target = [DeviceScalar];

    fn deref(&self) -> &[DeviceScalar] {
        &self.data
    }
}

#[cfg(feature = "wgpu")]
impl core::ops::DerefMut for DeviceWrite<'_> {
    fn deref_mut(&mut self) -> &mut [DeviceScalar] {
        &mut self.data
    }
}

#[cfg(feature = "wgpu")]
impl Drop for DeviceWrite<'_> {
    fn drop(&mut self) {
        let len = self.vec.len;
        if let Some(side) = self.vec.device.as_mut() {
            side.upload(len, &self.data);
        }
        self.vec.device_valid = true;
        self.vec.device_leases -= 1;
    }
}
