//! Templates for generated C++ / CUDA artifacts.

/// Pack info header (CPU).
pub const CPU_PACK_INFO_H_TEMPLATE: &str = r#"#pragma once
#include "stencil/Directions.h"
#include "core/cell/CellInterval.h"
#include "core/DataTypes.h"
#include "field/GhostLayerField.h"
#include "domain_decomposition/IBlock.h"
#include "communication/UniformPackInfo.h"

#define FUNC_PREFIX

namespace walberla {
namespace {{namespace}} {

class {{class_name}} : public ::walberla::communication::UniformPackInfo
{
public:
    {{class_name}}( BlockDataID {{field_name}}ID_ )
        : {{field_name}}ID({{field_name}}ID_)
    {};
    virtual ~{{class_name}}() {}

    bool constantDataExchange() const { return true; }
    bool threadsafeReceiving()  const { return true; }

    void packAll(unsigned char * buffer, IBlock * block) const;
    uint_t sizeAll(const IBlock * block) const;

    void unpackData(IBlock * receiver, stencil::Direction dir, mpi::RecvBuffer & buffer)
    {
        const auto dataSize = size(dir, receiver);
        unpack(dir, buffer.skip(dataSize), receiver);
    }

    void communicateLocal(const IBlock * sender, IBlock * receiver, stencil::Direction dir)
    {
        mpi::SendBuffer sBuffer;
        packData( sender, dir, sBuffer );
        mpi::RecvBuffer rBuffer( sBuffer );
        unpackData( receiver, stencil::inverseDir[dir], rBuffer );
    }

private:
    void packDataImpl(const IBlock * sender, stencil::Direction dir, mpi::SendBuffer & outBuffer) const
    {
        const auto dataSize = size(dir, sender);
        pack(dir, outBuffer.forward(dataSize), const_cast<IBlock*>(sender));
    }

    void pack  (stencil::Direction dir, unsigned char * buffer, IBlock * block) const;
    void unpack(stencil::Direction dir, unsigned char * buffer, IBlock * block) const;
    uint_t size(stencil::Direction dir, const IBlock * block) const;

    BlockDataID {{field_name}}ID;
};

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Pack info source (CPU).
pub const CPU_PACK_INFO_CPP_TEMPLATE: &str = r#"#include "stencil/Directions.h"
#include "core/cell/CellInterval.h"
#include "core/DataTypes.h"
#include "{{class_name}}.h"
{{#each headers}}
#include {{this}}
{{/each}}

#define FUNC_PREFIX

namespace walberla {
namespace {{namespace}} {

using walberla::cell::CellInterval;
using walberla::stencil::Direction;

{{#each kernels}}
{{pack.source}}

{{unpack.source}}

{{/each}}
{{fused_kernel.source}}


void {{class_name}}::pack(Direction dir, unsigned char * byte_buffer, IBlock * block) const
{
    auto {{field_name}} = block->getData< field::GhostLayerField<{{dtype}}, {{f_size}}> >({{field_name}}ID);

    CellInterval ci;
{{#if gl_to_inner}}
    {{field_name}}->getGhostRegion(dir, ci, 1, false);
{{else}}
    {{field_name}}->getSliceBeforeGhostLayer(dir, ci, 1, false);
{{/if}}

    switch( dir )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
        {
{{#each pack_setup}}
            {{this}}
{{/each}}
            {{pack.invocation}}
            break;
        }

{{/each}}
        default:
            WALBERLA_ASSERT(false);
    }
}

void {{class_name}}::unpack(Direction dir, unsigned char * byte_buffer, IBlock * block) const
{
    auto {{field_name}} = block->getData< field::GhostLayerField<{{dtype}}, {{f_size}}> >({{field_name}}ID);

    CellInterval ci;
{{#if gl_to_inner}}
    {{field_name}}->getSliceBeforeGhostLayer(dir, ci, 1, false);
{{else}}
    {{field_name}}->getGhostRegion(dir, ci, 1, false);
{{/if}}
    auto communicationDirection = stencil::inverseDir[dir];

    switch( communicationDirection )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
        {
{{#each unpack_setup}}
            {{this}}
{{/each}}
            {{unpack.invocation}}
            break;
        }

{{/each}}
        default:
            WALBERLA_ASSERT(false);
    }
}

uint_t {{class_name}}::size(stencil::Direction dir, const IBlock * block) const
{
    auto {{field_name}} = block->getData< field::GhostLayerField<{{dtype}}, {{f_size}}> >({{field_name}}ID);

    CellInterval ci;
    {{field_name}}->getGhostRegion(dir, ci, 1, false);

    uint_t elementsPerCell = 0;

    switch( dir )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
            elementsPerCell = {{elements_per_cell}};
            break;

{{/each}}
        default:
            elementsPerCell = 0;
    }
    return ci.numCells() * elementsPerCell * sizeof( {{dtype}} );
}

void {{class_name}}::packAll(unsigned char * byte_buffer, IBlock * block) const
{
    auto {{field_name}} = block->getData< field::GhostLayerField<{{dtype}}, {{f_size}}> >({{field_name}}ID);

    CellInterval ci = {{field_name}}->xyzSize();
{{#each fused_setup}}
    {{this}}
{{/each}}
    {{fused_kernel.invocation}}
}

uint_t {{class_name}}::sizeAll(const IBlock * block) const
{
    auto {{field_name}} = block->getData< field::GhostLayerField<{{dtype}}, {{f_size}}> >({{field_name}}ID);
    return {{field_name}}->xyzSize().numCells() * {{fused_elements_per_cell}} * sizeof( {{dtype}} );
}

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Pack info header (GPU).
pub const GPU_PACK_INFO_H_TEMPLATE: &str = r#"#pragma once
#include "stencil/Directions.h"
#include "core/cell/CellInterval.h"
#include "core/DataTypes.h"
#include "cuda/GPUField.h"
#include "cuda/communication/GeneratedGPUPackInfo.h"
#include "domain_decomposition/IBlock.h"

#include <cuda_runtime.h>

#define FUNC_PREFIX __global__

namespace walberla {
namespace {{namespace}} {

class {{class_name}} : public ::walberla::cuda::GeneratedGPUPackInfo
{
public:
    {{class_name}}( BlockDataID {{field_name}}ID_ )
        : {{field_name}}ID({{field_name}}ID_)
    {};
    virtual ~{{class_name}}() {}

    virtual void pack  (stencil::Direction dir, unsigned char * buffer, IBlock * block, cudaStream_t stream);
    virtual void unpack(stencil::Direction dir, unsigned char * buffer, IBlock * block, cudaStream_t stream);
    virtual uint_t size (stencil::Direction dir, IBlock * block);

    void packAll(unsigned char * buffer, IBlock * block, cudaStream_t stream);
    uint_t sizeAll(IBlock * block);

private:
    BlockDataID {{field_name}}ID;
};

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Pack info source (GPU).
pub const GPU_PACK_INFO_CU_TEMPLATE: &str = r#"#include "stencil/Directions.h"
#include "core/cell/CellInterval.h"
#include "cuda/GPUField.h"
#include "core/DataTypes.h"
#include "{{class_name}}.h"
{{#each headers}}
#include {{this}}
{{/each}}

#define FUNC_PREFIX __global__

namespace walberla {
namespace {{namespace}} {

using walberla::cell::CellInterval;
using walberla::stencil::Direction;

{{#each kernels}}
{{pack.source}}

{{unpack.source}}

{{/each}}
{{fused_kernel.source}}


void {{class_name}}::pack(Direction dir, unsigned char * byte_buffer, IBlock * block, cudaStream_t stream)
{
    auto {{field_name}} = block->getData< cuda::GPUField<{{dtype}}> >({{field_name}}ID);

    CellInterval ci;
{{#if gl_to_inner}}
    {{field_name}}->getGhostRegion(dir, ci, 1, false);
{{else}}
    {{field_name}}->getSliceBeforeGhostLayer(dir, ci, 1, false);
{{/if}}

    switch( dir )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
        {
{{#each pack_setup}}
            {{this}}
{{/each}}
            {{pack.invocation}}
            break;
        }

{{/each}}
        default:
            WALBERLA_ASSERT(false);
    }
}

void {{class_name}}::unpack(Direction dir, unsigned char * byte_buffer, IBlock * block, cudaStream_t stream)
{
    auto {{field_name}} = block->getData< cuda::GPUField<{{dtype}}> >({{field_name}}ID);

    CellInterval ci;
{{#if gl_to_inner}}
    {{field_name}}->getSliceBeforeGhostLayer(dir, ci, 1, false);
{{else}}
    {{field_name}}->getGhostRegion(dir, ci, 1, false);
{{/if}}
    auto communicationDirection = stencil::inverseDir[dir];

    switch( communicationDirection )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
        {
{{#each unpack_setup}}
            {{this}}
{{/each}}
            {{unpack.invocation}}
            break;
        }

{{/each}}
        default:
            WALBERLA_ASSERT(false);
    }
}

uint_t {{class_name}}::size(stencil::Direction dir, IBlock * block)
{
    auto {{field_name}} = block->getData< cuda::GPUField<{{dtype}}> >({{field_name}}ID);

    CellInterval ci;
    {{field_name}}->getGhostRegion(dir, ci, 1, false);

    uint_t elementsPerCell = 0;

    switch( dir )
    {
{{#each kernels}}
{{#each directions}}
        case stencil::{{this}}:
{{/each}}
            elementsPerCell = {{elements_per_cell}};
            break;

{{/each}}
        default:
            elementsPerCell = 0;
    }
    return ci.numCells() * elementsPerCell * sizeof( {{dtype}} );
}

void {{class_name}}::packAll(unsigned char * byte_buffer, IBlock * block, cudaStream_t stream)
{
    auto {{field_name}} = block->getData< cuda::GPUField<{{dtype}}> >({{field_name}}ID);

    CellInterval ci = {{field_name}}->xyzSize();
{{#each fused_setup}}
    {{this}}
{{/each}}
    {{fused_kernel.invocation}}
}

uint_t {{class_name}}::sizeAll(IBlock * block)
{
    auto {{field_name}} = block->getData< cuda::GPUField<{{dtype}}> >({{field_name}}ID);
    return {{field_name}}->xyzSize().numCells() * {{fused_elements_per_cell}} * sizeof( {{dtype}} );
}

} // namespace {{namespace}}
} // namespace walberla
"#;

/// MPI datatype info header.
pub const MPI_DTYPE_INFO_H_TEMPLATE: &str = r#"#pragma once
#include "core/debug/Debug.h"
#include "communication/UniformMPIDatatypeInfo.h"
#include "field/communication/MPIDatatypes.h"

#include <set>

namespace walberla {
namespace {{namespace}} {

class {{class_name}} : public ::walberla::communication::UniformMPIDatatypeInfo
{
public:
    {{class_name}}( BlockDataID {{field_name}} )
        :{{field_name}}_({{field_name}})
    {}
    virtual ~{{class_name}}() {}

    virtual shared_ptr<mpi::Datatype> getSendDatatype ( IBlock * block, const stencil::Direction dir )
    {
        return make_shared<mpi::Datatype>( field::communication::mpiDatatypeSliceBeforeGhostlayerXYZ(
                *getField( block ), dir, uint_t( 1 ), getOptimizedCommunicationIdx( dir ), false ) );
    }

    virtual shared_ptr<mpi::Datatype> getRecvDatatype ( IBlock * block, const stencil::Direction dir )
    {
        return make_shared<mpi::Datatype>( field::communication::mpiDatatypeGhostLayerOnlyXYZ(
                *getField( block ), dir, false, getOptimizedCommunicationIdx( stencil::inverseDir[dir] ) ) );
    }

    virtual void * getSendPointer( IBlock * block, const stencil::Direction )
    {
        return getField(block)->data();
    }

    virtual void * getRecvPointer( IBlock * block, const stencil::Direction )
    {
        return getField(block)->data();
    }

private:

    inline static std::set< cell_idx_t > getOptimizedCommunicationIdx( const stencil::Direction dir )
    {
        switch( dir )
        {
{{#each spec}}
            case stencil::{{direction}}:
                return { {{indices}} };
{{/each}}
            default:
                WALBERLA_ASSERT(false);
                return {};
        }
    }

    // {{kind}} communication
    field::GhostLayerField<real_t, {{f_size}}> * getField( IBlock * block )
    {
        auto f = block->getData< field::GhostLayerField<real_t, {{f_size}}> >( {{field_name}}_ );
        WALBERLA_ASSERT_NOT_NULLPTR( f );
        return f;
    }

    BlockDataID {{field_name}}_;
};

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Lattice model header.
pub const LATTICE_MODEL_H_TEMPLATE: &str = r#"#pragma once

#include "core/DataTypes.h"
#include "core/logging/Logging.h"
#include "field/GhostLayerField.h"
#include "field/SwapableCompare.h"
#include "domain_decomposition/BlockDataID.h"
#include "domain_decomposition/IBlock.h"
#include "stencil/{{stencil_name}}.h"

#include "lbm/lattice_model/EquilibriumDistribution.h"
#include "lbm/field/Density.h"
#include "lbm/field/DensityAndMomentumDensity.h"
#include "lbm/field/DensityAndVelocity.h"
#include "lbm/field/PdfField.h"
#include "lbm/sweeps/Streaming.h"
#include "lbm/lattice_model/LatticeModelBase.h"

#include <set>

namespace walberla {
namespace {{namespace}} {

class {{class_name}}
{

public:
    class Sweep
    {
    public:
        Sweep( BlockDataID _pdfsID ) : pdfsID(_pdfsID) {};

        void streamCollide( IBlock * block, const uint_t numberOfGhostLayersToInclude=0 );
        void collide( IBlock * block, const uint_t numberOfGhostLayersToInclude=0 );
        void stream( IBlock * block, const uint_t numberOfGhostLayersToInclude=0 );

        void operator() ( IBlock * block, const uint_t numberOfGhostLayersToInclude=0 )
        {
            streamCollide( block, numberOfGhostLayersToInclude );
        }

    private:
        BlockDataID pdfsID;
    };

    {{class_name}}( {{#each members}}{{c_type}} {{name}}{{#unless @last}}, {{/unless}}{{/each}} )
        : {{#each members}}{{name}}_({{name}}), {{/each}}level_(0)
    {};

    void configure( IBlock & block, StructuredBlockStorage & storage )  { configureBlock( &block, &storage ); }

    // ------------------------- Common Lattice Model Interface -------------------------------------------------
    typedef stencil::{{stencil_name}} Stencil;
    typedef stencil::{{communication_stencil_name}} CommunicationStencil;
    static const real_t w[{{q}}];
    static const real_t wInv[{{q}}];

    static const bool compressible = {{compressible}};
    static const int equilibriumAccuracyOrder = 2;

    class ForceModel
    {
    public:
        typedef void tag;
        bool constant = true;
        bool shiftMacVel = {{has_velocity_shift}};
        bool shiftEquVel = false;
    };
    ForceModel forceModel_;

    std::string getName() const { return "{{class_name}}"; }

private:
    void configureBlock(IBlock * block, StructuredBlockStorage * storage);

    // ------------------------- Member Variables ---------------------------------------------------------------
{{#each members}}
    {{c_type}} {{name}}_;
{{/each}}
{{#each need_block_offsets}}
{{#if this}}
    int64_t block_offset_{{@index}}_;
{{/if}}
{{/each}}
    uint_t level_;

    // ------------------------- Friends ------------------------------------------------------------------------
    friend class lbm::EquilibriumDistribution< {{class_name}}, void >;
    friend struct lbm::Equilibrium< {{class_name}}, void >;
    friend struct lbm::internal::AdaptVelocityToForce< {{class_name}}, void >;
    friend struct lbm::Density< {{class_name}}, void >;
    friend struct lbm::DensityAndMomentumDensity< {{class_name}} >;
    friend struct lbm::MomentumDensity< {{class_name}} >;
    friend struct lbm::DensityAndVelocity< {{class_name}} >;
};

} // namespace {{namespace}}

namespace lbm {

template<>
class EquilibriumDistribution< {{namespace}}::{{class_name}}, void >
{
public:
    typedef typename {{namespace}}::{{class_name}}::Stencil Stencil;

    static real_t get( const stencil::Direction direction,
                       const Vector3< real_t > & u = Vector3< real_t >( real_t(0.0) ),
                       real_t rho = real_t(1.0) )
    {
        {{equilibrium_from_direction}}
    }

    static real_t getSymmetricPart( const stencil::Direction direction,
                                    const Vector3<real_t> & u = Vector3< real_t >(real_t(0.0)),
                                    real_t rho = real_t(1.0) )
    {
        {{symmetric_equilibrium_from_direction}}
    }

    static real_t getAsymmetricPart( const stencil::Direction direction,
                                     const Vector3< real_t > & u = Vector3<real_t>( real_t(0.0) ),
                                     real_t rho = real_t(1.0) )
    {
        {{asymmetric_equilibrium_from_direction}}
    }

    static std::vector< real_t > get( const Vector3< real_t > & u = Vector3<real_t>( real_t(0.0) ),
                                      real_t rho = real_t(1.0) )
    {

        std::vector< real_t > equilibrium( Stencil::Size );
        for( auto d = Stencil::begin(); d != Stencil::end(); ++d )
        {
            equilibrium[d.toIdx()] = get(*d, u, rho);
        }
        return equilibrium;
    }
};

namespace internal {

template<>
struct AdaptVelocityToForce<{{namespace}}::{{class_name}}, void>
{
    template< typename FieldPtrOrIterator >
    static Vector3<real_t> get( FieldPtrOrIterator & it, const {{namespace}}::{{class_name}} & lm,
                                const Vector3< real_t > & velocity, const real_t rho )
    {
        auto x = it.x();
        auto y = it.y();
        auto z = it.z();
{{#if has_velocity_shift}}
        return velocity - Vector3<real_t>({{#each macroscopic_velocity_shift}}{{this}}{{#unless @last}}, {{/unless}}{{/each}});
{{else}}
        return velocity;
{{/if}}
    }
};

} // namespace internal

template<>
struct Density<{{namespace}}::{{class_name}}, void>
{
    template< typename FieldPtrOrIterator >
    static inline real_t get( const {{namespace}}::{{class_name}} & , const FieldPtrOrIterator & it )
    {
{{#each pdf_indices}}
        const real_t f_{{this}} = it[{{this}}];
{{/each}}
        {{density_getters}}
        return rho;
    }
};

template<>
struct DensityAndVelocity<{{namespace}}::{{class_name}}>
{
    template< typename FieldPtrOrIterator >
    static void set( FieldPtrOrIterator & it, const {{namespace}}::{{class_name}} & lm,
                     const Vector3< real_t > & u = Vector3< real_t >( real_t(0.0) ), const real_t rho_in = real_t(1.0) )
    {
        {{density_velocity_setter_macroscopic_values}}

        Equilibrium<{{namespace}}::{{class_name}} >::set(it, Vector3<real_t>({{#each velocity_components}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}), rho);
    }
};

template<>
struct DensityAndMomentumDensity<{{namespace}}::{{class_name}}>
{
    template< typename FieldPtrOrIterator >
    static real_t get( Vector3< real_t > & momentumDensity, const {{namespace}}::{{class_name}} & lm,
                       const FieldPtrOrIterator & it )
    {
        const auto x = it.x();
        const auto y = it.y();
        const auto z = it.z();

{{#each pdf_indices}}
        const real_t f_{{this}} = it[{{this}}];
{{/each}}

        {{momentum_density_getter}}
{{#each momentum_components}}
        momentumDensity[{{@index}}] = {{this}};
{{/each}}
        return rho;
    }
};

} // namespace lbm
} // namespace walberla
"#;

/// Lattice model source.
pub const LATTICE_MODEL_CPP_TEMPLATE: &str = r#"#include <cmath>

#include "core/DataTypes.h"
#include "core/Macros.h"
#include "lbm/field/PdfField.h"
#include "lbm/sweeps/Streaming.h"
#include "{{class_name}}.h"
#include "core/logging/Logging.h"
{{#each headers}}
#include {{this}}
{{/each}}

#define FUNC_PREFIX

using namespace std;

namespace walberla {
namespace {{namespace}} {

{{stream_collide_kernel.source}}

{{collide_kernel.source}}

{{stream_kernel.source}}

const real_t {{class_name}}::w[{{q}}] = { {{weights}} };
const real_t {{class_name}}::wInv[{{q}}] = { {{inverse_weights}} };

void {{class_name}}::configureBlock(IBlock * block, StructuredBlockStorage * storage)
{
{{#each need_block_offsets}}
{{#if this}}
    block_offset_{{@index}}_ = int64_c( storage->getBlockCellBB( *block ).min()[{{@index}}] );
{{/if}}
{{/each}}
    level_ = block->getBlockStorage().getLevel(*block);
{{#each refinement_scaling_info}}
{{#if (eq kind "normal")}}
    {{name}} = {{expr}};
{{/if}}
{{/each}}
    WALBERLA_UNUSED( storage );
}

void {{class_name}}::Sweep::streamCollide( IBlock * block, const uint_t numberOfGhostLayersToInclude )
{
    auto & lm = dynamic_cast< lbm::PdfField<{{class_name}}> * > (block->getData<field::GhostLayerField<real_t, {{q}}> >(pdfsID))->latticeModel();
    auto pdfs = block->getData< field::GhostLayerField<real_t, {{q}}> >(pdfsID);
    field::GhostLayerField<real_t, {{q}}> * pdfs_tmp = pdfs->cloneUninitialized();
    WALBERLA_UNUSED( numberOfGhostLayersToInclude );
{{#each stream_collide_kernel.setup}}
    {{this}}
{{/each}}
    {{stream_collide_kernel.invocation}}
{{#each stream_collide_kernel.field_swaps}}
    {{this.[0]}}->swapDataPointers({{this.[1]}});
{{/each}}
    delete pdfs_tmp;
    WALBERLA_UNUSED( lm );
}

void {{class_name}}::Sweep::collide( IBlock * block, const uint_t numberOfGhostLayersToInclude )
{
    auto & lm = dynamic_cast< lbm::PdfField<{{class_name}}> * > (block->getData<field::GhostLayerField<real_t, {{q}}> >(pdfsID))->latticeModel();
    auto pdfs = block->getData< field::GhostLayerField<real_t, {{q}}> >(pdfsID);
    WALBERLA_UNUSED( numberOfGhostLayersToInclude );
{{#each collide_kernel.setup}}
    {{this}}
{{/each}}
    {{collide_kernel.invocation}}
    WALBERLA_UNUSED( lm );
}

void {{class_name}}::Sweep::stream( IBlock * block, const uint_t numberOfGhostLayersToInclude )
{
    auto pdfs = block->getData< field::GhostLayerField<real_t, {{q}}> >(pdfsID);
    field::GhostLayerField<real_t, {{q}}> * pdfs_tmp = pdfs->cloneUninitialized();
    WALBERLA_UNUSED( numberOfGhostLayersToInclude );
{{#each stream_kernel.setup}}
    {{this}}
{{/each}}
    {{stream_kernel.invocation}}
{{#each stream_kernel.field_swaps}}
    {{this.[0]}}->swapDataPointers({{this.[1]}});
{{/each}}
    delete pdfs_tmp;
}

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Sweep header.
pub const SWEEP_H_TEMPLATE: &str = r#"#pragma once
#include "core/DataTypes.h"
#include "core/cell/CellInterval.h"
#include "domain_decomposition/BlockDataID.h"
#include "domain_decomposition/IBlock.h"
#include "stencil/Directions.h"
{{#if gpu}}
#include "cuda/GPUField.h"

#include <cuda_runtime.h>
{{else}}
#include "field/GhostLayerField.h"
{{/if}}

#include <functional>
#include <unordered_map>
#include <vector>

namespace walberla {
namespace {{namespace}} {

class {{class_name}}
{
public:
    {{class_name}}( {{constructor_parameters}} )
        : {{initialiser_list}}
    {};

    ~{{class_name}}()
    {
{{#each temporaries}}
        for( auto p : cache_{{name}} )
            delete p.second;
{{/each}}
    }

    void operator()( IBlock * block{{#if gpu}}, cudaStream_t stream = nullptr{{/if}} );
{{#if inner_outer_split}}
    void inner( IBlock * block{{#if gpu}}, cudaStream_t stream = nullptr{{/if}} );
    void outer( IBlock * block{{#if gpu}}, cudaStream_t stream = nullptr{{/if}} );

    void setOuterWidth( const Cell & outerWidth )
    {
        outerWidth_ = outerWidth;
        layers_.clear();
    }
{{/if}}

    static std::function<void (IBlock *)> getSweep( const shared_ptr<{{class_name}}> & kernel )
    {
        return [kernel] ( IBlock * b ) { (*kernel)(b); };
    }

{{#each block_fields}}
    BlockDataID {{name}}ID;
{{/each}}
{{#each scalars}}
    {{c_type}} {{name}}_;
{{/each}}

private:
{{#each temporaries}}
    std::unordered_map< IBlock *, {{field_type}} * > cache_{{name}};
{{/each}}
{{#if inner_outer_split}}
    Cell outerWidth_;
    std::vector< CellInterval > layers_;
{{/if}}
};

} // namespace {{namespace}}
} // namespace walberla
"#;

/// Sweep source (`.cpp` on CPU, `.cu` on GPU).
pub const SWEEP_CPP_TEMPLATE: &str = r#"#include <cmath>

#include "core/DataTypes.h"
#include "core/Macros.h"
#include "{{class_name}}.h"
{{#each headers}}
#include {{this}}
{{/each}}

{{#if gpu}}
#define FUNC_PREFIX __global__
{{else}}
#define FUNC_PREFIX
{{/if}}

using namespace std;

namespace walberla {
namespace {{namespace}} {

{{kernel.source}}

void {{class_name}}::operator()( IBlock * block{{#if gpu}}, cudaStream_t stream{{/if}} )
{
{{#each block_setup}}
    {{this}}
{{/each}}

    CellInterval ci = {{field}}->xyzSize();
    ci.expand( cell_idx_c({{iteration_ghost_layers}}) );
{{#each kernel.setup}}
    {{this}}
{{/each}}
    {{kernel.invocation}}
{{#each kernel.field_swaps}}
    {{this.[0]}}->swapDataPointers({{this.[1]}});
{{/each}}
}
{{#if inner_outer_split}}

void {{class_name}}::inner( IBlock * block{{#if gpu}}, cudaStream_t stream{{/if}} )
{
{{#each block_setup}}
    {{this}}
{{/each}}

    CellInterval ci = {{field}}->xyzSize();
    ci.expand( Cell( -outerWidth_[0], -outerWidth_[1], -outerWidth_[2] ) );
    ci.expand( cell_idx_c({{kernel_ghost_layers}}) );
{{#each kernel.setup}}
    {{this}}
{{/each}}
    {{kernel.invocation}}
}

void {{class_name}}::outer( IBlock * block{{#if gpu}}, cudaStream_t stream{{/if}} )
{
{{#each block_setup}}
    {{this}}
{{/each}}

    if( layers_.empty() )
    {
        CellInterval ci;

        {{field}}->getSliceBeforeGhostLayer(stencil::T, ci, outerWidth_[2], false);
        layers_.push_back(ci);
        {{field}}->getSliceBeforeGhostLayer(stencil::B, ci, outerWidth_[2], false);
        layers_.push_back(ci);

        {{field}}->getSliceBeforeGhostLayer(stencil::N, ci, outerWidth_[1], false);
        ci.expand( Cell( 0, 0, -outerWidth_[2] ) );
        layers_.push_back(ci);
        {{field}}->getSliceBeforeGhostLayer(stencil::S, ci, outerWidth_[1], false);
        ci.expand( Cell( 0, 0, -outerWidth_[2] ) );
        layers_.push_back(ci);

        {{field}}->getSliceBeforeGhostLayer(stencil::E, ci, outerWidth_[0], false);
        ci.expand( Cell( 0, -outerWidth_[1], -outerWidth_[2] ) );
        layers_.push_back(ci);
        {{field}}->getSliceBeforeGhostLayer(stencil::W, ci, outerWidth_[0], false);
        ci.expand( Cell( 0, -outerWidth_[1], -outerWidth_[2] ) );
        layers_.push_back(ci);
    }

    for( auto & layer : layers_ )
    {
        CellInterval ci = layer;
        ci.expand( cell_idx_c({{kernel_ghost_layers}}) );
{{#each kernel.setup}}
        {{this}}
{{/each}}
        {{kernel.invocation}}
    }
{{#each kernel.field_swaps}}
    {{this.[0]}}->swapDataPointers({{this.[1]}});
{{/each}}
}
{{/if}}

} // namespace {{namespace}}
} // namespace walberla
"#;
