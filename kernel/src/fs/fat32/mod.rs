mod fat32;

pub use fat32::Fat32Fs;
